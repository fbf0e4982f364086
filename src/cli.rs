//! Invocation parsing for Gangway
//!
//! The runtime passes everything through `CNI_*` environment variables.
//! Each one can also be given as a long flag, which is handy when running
//! the plugin by hand.

use crate::error::{Error, Result};
use crate::plugin::CmdArgs;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Gangway - CNI bridge plugin
#[derive(Parser, Debug)]
#[command(name = "gangway")]
#[command(about = "Attach container network namespaces to a host bridge", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Operation requested by the runtime
    #[arg(long, env = "CNI_COMMAND", value_enum, ignore_case = true)]
    pub command: Verb,

    /// Container ID
    #[arg(long, env = "CNI_CONTAINERID")]
    pub container_id: Option<String>,

    /// Path to the container network namespace
    #[arg(long, env = "CNI_NETNS")]
    pub netns: Option<String>,

    /// Interface name to create inside the container
    #[arg(long = "ifname", env = "CNI_IFNAME")]
    pub if_name: Option<String>,

    /// Extra arguments (KEY=VALUE;...), passed through to IPAM
    #[arg(long, env = "CNI_ARGS", default_value = "")]
    pub args: String,

    /// Plugin search path, colon separated
    #[arg(long, env = "CNI_PATH", value_delimiter = ':')]
    pub path: Vec<String>,
}

/// CNI commands
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum Verb {
    /// Attach a container
    Add,
    /// Detach a container
    Del,
    /// Report supported versions
    Version,
}

impl Cli {
    /// Parse the invocation from the environment and command line
    ///
    /// `--help` prints and exits; anything else clap rejects becomes an
    /// invalid-environment error.
    pub fn parse_invocation() -> Result<Self> {
        match Self::try_parse() {
            Ok(cli) => Ok(cli),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => Err(invocation_error(&e)),
        }
    }

    /// Build the arguments for ADD or DEL, with the stdin payload
    pub fn cmd_args(&self, stdin: Vec<u8>) -> Result<CmdArgs> {
        let container_id = required(&self.container_id, "CNI_CONTAINERID")?;
        let if_name = required(&self.if_name, "CNI_IFNAME")?;

        // IFNAMSIZ is 16 including the terminator
        if if_name.len() > 15 {
            return Err(Error::InvalidInvocation(format!(
                "Interface name too long: {} (max 15 chars)",
                if_name
            )));
        }

        Ok(CmdArgs {
            container_id,
            netns: self
                .netns
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .map(PathBuf::from),
            if_name,
            args: self.args.clone(),
            path: self
                .path
                .iter()
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .collect(),
            stdin,
        })
    }
}

fn required(value: &Option<String>, var: &str) -> Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::InvalidInvocation(format!("{} is required", var))),
    }
}

fn invocation_error(err: &clap::Error) -> Error {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    Error::InvalidInvocation(first.trim_start_matches("error: ").to_string())
}
