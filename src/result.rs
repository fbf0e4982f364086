//! CNI documents written to stdout
//!
//! Provides:
//! - The 0.2.0 result returned by IPAM plugins and echoed on ADD
//! - The error document emitted on any failure
//! - The VERSION reply

use crate::error::{Error, Result};
use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::IpAddr;

/// CNI version this plugin speaks
pub const CNI_VERSION: &str = "0.2.0";

/// Versions accepted in `cniVersion`
pub const SUPPORTED_VERSIONS: &[&str] = &["0.1.0", "0.2.0"];

/// A route entry in an IP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub dst: IpNet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<IpAddr>,
}

/// Address, gateway and routes for one address family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub ip: IpNet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// DNS settings passed through from the IPAM plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dns {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Dns {
    fn is_empty(&self) -> bool {
        self == &Dns::default()
    }
}

/// Allocation result, as produced by IPAM and printed on ADD
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniResult {
    #[serde(rename = "cniVersion", default, skip_serializing_if = "Option::is_none")]
    pub cni_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip4: Option<IpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip6: Option<IpConfig>,
    #[serde(default, skip_serializing_if = "Dns::is_empty")]
    pub dns: Dns,
}

impl CniResult {
    /// The IPv4 address to put on the container interface, if any
    ///
    /// An `ip4` block carrying a non-IPv4 network is not usable.
    pub fn ipv4(&self) -> Option<Ipv4Net> {
        match self.ip4.as_ref()?.ip {
            IpNet::V4(net) => Some(net),
            IpNet::V6(_) => None,
        }
    }

    /// Write the result as JSON
    pub fn print<W: Write>(&self, out: W) -> Result<()> {
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}

/// Error document understood by container runtimes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    #[serde(rename = "cniVersion", default)]
    pub cni_version: String,
    pub code: u32,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl ErrorDocument {
    pub fn print<W: Write>(&self, out: W) -> Result<()> {
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}

impl From<&Error> for ErrorDocument {
    fn from(err: &Error) -> Self {
        Self {
            cni_version: CNI_VERSION.to_string(),
            code: err.code(),
            msg: err.to_string(),
            details: err.kind().to_string(),
        }
    }
}

/// Reply to the VERSION command
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    #[serde(rename = "cniVersion")]
    pub cni_version: &'static str,
    #[serde(rename = "supportedVersions")]
    pub supported_versions: &'static [&'static str],
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            cni_version: CNI_VERSION,
            supported_versions: SUPPORTED_VERSIONS,
        }
    }

    pub fn print<W: Write>(&self, out: W) -> Result<()> {
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}
