//! iproute2 backend for `LinkOps`
//!
//! Drives the `ip` utility. Commands run in the namespace of the calling
//! thread, since a spawned child inherits the namespaces of the thread that
//! forked it.

use crate::error::{Error, Result};
use crate::network::link::{Link, LinkOps};
use crate::network::netns::NetNs;
use ipnet::{IpNet, Ipv4Net};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// `LinkOps` implemented with the iproute2 `ip` command
#[derive(Debug, Clone)]
pub struct IpRoute2 {
    binary: PathBuf,
}

impl Default for IpRoute2 {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ip"),
        }
    }
}

impl IpRoute2 {
    /// Use a specific `ip` binary instead of the one found on PATH
    #[allow(dead_code)]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        tracing::trace!(args = ?args, "ip");
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| Error::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    /// Run `ip` and return its stdout, failing on a non-zero exit
    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.output(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                message: stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl LinkOps for IpRoute2 {
    type Netns = NetNs;

    fn open_netns(&self, path: &Path) -> Result<NetNs> {
        NetNs::open(path)
    }

    fn with_netns<T, F>(&self, netns: &NetNs, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send,
    {
        tracing::trace!(netns = %netns.path().display(), "switching netns");
        netns.run(f)
    }

    fn link(&self, name: &str) -> Result<Option<Link>> {
        let args = ["-d", "-j", "link", "show", "dev", name];
        let output = self.output(&args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Don't fail if the device simply does not exist
            if stderr.contains("does not exist") {
                return Ok(None);
            }
            return Err(Error::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                message: stderr.trim().to_string(),
            });
        }

        parse_link(&output.stdout)
    }

    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<()> {
        let mtu = mtu.to_string();
        self.run(&[
            "link", "add", name, "mtu", &mtu, "type", "veth", "peer", "name", peer, "mtu", &mtu,
        ])?;
        Ok(())
    }

    fn move_to_host(&self, name: &str) -> Result<()> {
        // Our own PID names the host namespace: only the worker thread ever
        // leaves it, never the thread group leader
        let pid = std::process::id().to_string();
        self.run(&["link", "set", "dev", name, "netns", &pid])?;
        Ok(())
    }

    fn set_up(&self, name: &str) -> Result<()> {
        self.run(&["link", "set", "dev", name, "up"])?;
        Ok(())
    }

    fn set_master(&self, name: &str, bridge: &str) -> Result<()> {
        self.run(&["link", "set", "dev", name, "master", bridge])?;
        Ok(())
    }

    fn set_hairpin(&self, name: &str, on: bool) -> Result<()> {
        let mode = if on { "on" } else { "off" };
        self.run(&["link", "set", "dev", name, "type", "bridge_slave", "hairpin", mode])?;
        Ok(())
    }

    fn ipv4_addrs(&self, name: &str) -> Result<Vec<Ipv4Net>> {
        let stdout = self.run(&["-j", "-4", "addr", "show", "dev", name])?;
        parse_ipv4_addrs(&stdout)
    }

    fn add_addr(&self, name: &str, addr: IpNet) -> Result<()> {
        self.run(&["addr", "add", &addr.to_string(), "dev", name])?;
        Ok(())
    }

    fn add_route(&self, name: &str, dst: IpNet, via: Option<IpAddr>) -> Result<()> {
        let dst = dst.to_string();
        let gw = via.map(|gw| gw.to_string());

        let mut args = vec!["route", "add", dst.as_str()];
        if let Some(ref gw) = gw {
            args.extend(["via", gw.as_str()]);
        }
        args.extend(["dev", name]);

        self.run(&args)?;
        Ok(())
    }

    fn del_link(&self, name: &str) -> Result<()> {
        self.run(&["link", "del", "dev", name])?;
        Ok(())
    }
}

/// One entry of `ip -d -j link show`
#[derive(Debug, Deserialize)]
struct JsonLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    master: Option<String>,
    #[serde(default)]
    linkinfo: Option<JsonLinkInfo>,
}

#[derive(Debug, Deserialize)]
struct JsonLinkInfo {
    #[serde(default)]
    info_kind: Option<String>,
    #[serde(default)]
    info_slave_data: Option<JsonSlaveData>,
}

#[derive(Debug, Deserialize)]
struct JsonSlaveData {
    #[serde(default)]
    hairpin: Option<bool>,
}

/// One entry of `ip -j -4 addr show`
#[derive(Debug, Deserialize)]
struct JsonAddrs {
    #[serde(default)]
    addr_info: Vec<JsonAddr>,
}

#[derive(Debug, Deserialize)]
struct JsonAddr {
    #[serde(default)]
    family: String,
    local: String,
    prefixlen: u8,
}

fn parse_link(json: &[u8]) -> Result<Option<Link>> {
    let links: Vec<JsonLink> = serde_json::from_slice(json).map_err(|e| Error::CommandFailed {
        command: "ip link show".to_string(),
        message: format!("Unexpected output: {}", e),
    })?;

    Ok(links.into_iter().next().map(|l| {
        let (kind, hairpin) = match l.linkinfo {
            Some(info) => (
                info.info_kind,
                info.info_slave_data.and_then(|data| data.hairpin),
            ),
            None => (None, None),
        };

        Link {
            name: l.ifname,
            index: l.ifindex,
            kind,
            master: l.master,
            hairpin,
        }
    }))
}

fn parse_ipv4_addrs(json: &[u8]) -> Result<Vec<Ipv4Net>> {
    let entries: Vec<JsonAddrs> = serde_json::from_slice(json).map_err(|e| Error::CommandFailed {
        command: "ip addr show".to_string(),
        message: format!("Unexpected output: {}", e),
    })?;
    let mut addrs = Vec::new();

    for addr in entries.iter().flat_map(|e| &e.addr_info) {
        if addr.family != "inet" {
            continue;
        }

        let ip: Ipv4Addr = addr.local.parse().map_err(|e| Error::CommandFailed {
            command: "ip addr show".to_string(),
            message: format!("Invalid address '{}': {}", addr.local, e),
        })?;
        let net = Ipv4Net::new(ip, addr.prefixlen).map_err(|e| Error::CommandFailed {
            command: "ip addr show".to_string(),
            message: format!("Invalid prefix length {}: {}", addr.prefixlen, e),
        })?;

        addrs.push(net);
    }

    Ok(addrs)
}
