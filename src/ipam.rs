//! Address allocation through an external IPAM plugin
//!
//! Provides:
//! - The `Ipam` capability used by the orchestrator
//! - `ExecIpam`, which runs the plugin binary named by `ipam.type` from
//!   `CNI_PATH` with the CNI environment and the raw NetConf on stdin

use crate::error::{Error, Result};
use crate::result::{CniResult, ErrorDocument};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Address allocation and release
pub trait Ipam {
    /// Allocate an address; `config` is the NetConf exactly as received
    fn allocate(&self, plugin: &str, config: &[u8]) -> Result<CniResult>;

    /// Release whatever `allocate` handed out for this container
    fn release(&self, plugin: &str, config: &[u8]) -> Result<()>;
}

/// CNI environment forwarded to the IPAM plugin
#[derive(Debug, Clone, Default)]
pub struct IpamEnv {
    pub container_id: String,
    pub netns: Option<PathBuf>,
    pub if_name: String,
    pub args: String,
}

/// Why an IPAM run failed
struct PluginFailure {
    /// CNI error code reported by the plugin (0 if it reported none)
    code: u32,
    message: String,
}

/// Runs IPAM plugins as child processes
#[derive(Debug, Clone)]
pub struct ExecIpam {
    /// Directories searched for the plugin binary
    search_path: Vec<PathBuf>,
    env: IpamEnv,
}

impl ExecIpam {
    pub fn new(search_path: Vec<PathBuf>, env: IpamEnv) -> Self {
        Self { search_path, env }
    }

    /// Locate `plugin` in the search path
    pub fn find(&self, plugin: &str) -> Option<PathBuf> {
        self.search_path
            .iter()
            .map(|dir| dir.join(plugin))
            .find(|candidate| candidate.is_file())
    }

    /// Run `plugin` with `CNI_COMMAND=command`, returning its stdout
    fn exec(
        &self,
        plugin: &str,
        command: &str,
        config: &[u8],
    ) -> std::result::Result<Vec<u8>, PluginFailure> {
        let binary = self.find(plugin).ok_or_else(|| PluginFailure {
            code: 0,
            message: format!(
                "failed to find plugin '{}' in path {:?}",
                plugin, self.search_path
            ),
        })?;

        tracing::debug!(plugin, command, binary = %binary.display(), "executing IPAM plugin");

        let output = self.spawn(&binary, command, config).map_err(|e| PluginFailure {
            code: 0,
            message: format!("failed to run {}: {}", binary.display(), e),
        })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        // Plugins report failures as an error document on stdout
        if let Ok(doc) = serde_json::from_slice::<ErrorDocument>(&output.stdout) {
            let message = if doc.details.is_empty() {
                doc.msg
            } else {
                format!("{}; {}", doc.msg, doc.details)
            };
            return Err(PluginFailure {
                code: doc.code,
                message,
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            format!("{} exited with {}", binary.display(), output.status)
        } else {
            stderr.trim().to_string()
        };

        Err(PluginFailure { code: 0, message })
    }

    fn spawn(&self, binary: &Path, command: &str, config: &[u8]) -> std::io::Result<Output> {
        let netns = self
            .env
            .netns
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let path = env::join_paths(&self.search_path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let mut child = Command::new(binary)
            .env("CNI_COMMAND", command)
            .env("CNI_CONTAINERID", &self.env.container_id)
            .env("CNI_NETNS", netns)
            .env("CNI_IFNAME", &self.env.if_name)
            .env("CNI_ARGS", &self.env.args)
            .env("CNI_PATH", path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(config)?;
        }

        child.wait_with_output()
    }
}

impl Ipam for ExecIpam {
    fn allocate(&self, plugin: &str, config: &[u8]) -> Result<CniResult> {
        let stdout = self
            .exec(plugin, "ADD", config)
            .map_err(|f| Error::Allocation {
                plugin: plugin.to_string(),
                code: f.code,
                message: f.message,
            })?;

        serde_json::from_slice(&stdout).map_err(|e| Error::Allocation {
            plugin: plugin.to_string(),
            code: 0,
            message: format!("failed to decode result: {}", e),
        })
    }

    fn release(&self, plugin: &str, config: &[u8]) -> Result<()> {
        self.exec(plugin, "DEL", config)
            .map_err(|f| Error::Release {
                plugin: plugin.to_string(),
                code: f.code,
                message: f.message,
            })?;
        Ok(())
    }
}
