//! Gangway - CNI bridge plugin
//!
//! Attaches a container's network namespace to an existing host bridge
//! through a veth pair and configures the address handed out by an IPAM
//! plugin. DEL releases the address and removes the pair.

mod cli;
mod error;
mod ipam;
mod logging;
mod netconf;
mod network;
mod plugin;
mod result;

use cli::{Cli, Verb};
use error::Result;
use ipam::{ExecIpam, IpamEnv};
use network::IpRoute2;
use plugin::Plugin;
use result::{ErrorDocument, VersionInfo};

use std::io::{self, Read, Write};
use std::path::Path;
use tracing::Dispatch;

fn main() {
    let dispatch = logging::open(Path::new(logging::LOG_FILE));

    if let Err(e) = run(&dispatch) {
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(error = %e, code = e.code(), "exiting with error");
        });

        // The runtime reads failures from stdout
        let mut stdout = io::stdout().lock();
        let printed = ErrorDocument::from(&e)
            .print(&mut stdout)
            .and_then(|_| writeln!(stdout).map_err(Into::into));
        if printed.is_err() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(dispatch: &Dispatch) -> Result<()> {
    let cli = Cli::parse_invocation()?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Verb::Version => {
            VersionInfo::current().print(&mut stdout)?;
            writeln!(stdout)?;
        }
        Verb::Add | Verb::Del => {
            let mut stdin = Vec::new();
            io::stdin().read_to_end(&mut stdin)?;
            let args = cli.cmd_args(stdin)?;

            let ipam = ExecIpam::new(
                args.path.clone(),
                IpamEnv {
                    container_id: args.container_id.clone(),
                    netns: args.netns.clone(),
                    if_name: args.if_name.clone(),
                    args: args.args.clone(),
                },
            );
            let plugin = Plugin::new(IpRoute2::default(), ipam, dispatch.clone());

            if cli.command == Verb::Add {
                if let Some(result) = plugin.add(&args)? {
                    result.print(&mut stdout)?;
                    writeln!(stdout)?;
                }
            } else {
                plugin.del(&args)?;
            }
        }
    }

    stdout.flush()?;
    Ok(())
}
