//! Kernel capability interface
//!
//! Every operation acts on the network namespace of the calling thread.
//! `with_netns` is the only way to act on another namespace.

use crate::error::Result;
use ipnet::{IpNet, Ipv4Net};
use std::net::IpAddr;
use std::path::Path;

/// A network interface as seen by the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Interface name
    pub name: String,
    /// Interface index (changes when the link moves between namespaces)
    pub index: u32,
    /// Link kind ("bridge", "veth", ...); `None` for physical devices
    pub kind: Option<String>,
    /// Controlling bridge, if enslaved
    pub master: Option<String>,
    /// Hairpin flag of the bridge port, if enslaved
    pub hairpin: Option<bool>,
}

impl Link {
    /// Check if this link is a bridge device
    pub fn is_bridge(&self) -> bool {
        self.kind.as_deref() == Some("bridge")
    }
}

/// Link, address and namespace primitives
pub trait LinkOps: Sync {
    /// Handle to an opened network namespace
    type Netns: Send + Sync;

    /// Open the namespace at `path`
    fn open_netns(&self, path: &Path) -> Result<Self::Netns>;

    /// Run `f` inside `netns`, restoring the original namespace afterwards
    fn with_netns<T, F>(&self, netns: &Self::Netns, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send;

    /// Look up a link by name; `Ok(None)` if no such device exists
    fn link(&self, name: &str) -> Result<Option<Link>>;

    /// Create a veth pair `name` <-> `peer`, both with `mtu`
    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<()>;

    /// Move a link into this process's (host) namespace
    fn move_to_host(&self, name: &str) -> Result<()>;

    /// Bring a link up
    fn set_up(&self, name: &str) -> Result<()>;

    /// Enslave a link to a bridge
    fn set_master(&self, name: &str, bridge: &str) -> Result<()>;

    /// Set the hairpin flag of a bridge port
    fn set_hairpin(&self, name: &str, on: bool) -> Result<()>;

    /// List IPv4 addresses on a link
    fn ipv4_addrs(&self, name: &str) -> Result<Vec<Ipv4Net>>;

    /// Add an address to a link
    fn add_addr(&self, name: &str, addr: IpNet) -> Result<()>;

    /// Add a route out of a link
    fn add_route(&self, name: &str, dst: IpNet, via: Option<IpAddr>) -> Result<()>;

    /// Delete a link (for veths, the peer goes with it)
    fn del_link(&self, name: &str) -> Result<()>;
}
