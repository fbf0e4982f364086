//! Network configuration parsing for Gangway
//!
//! Parses the NetConf JSON document the runtime writes on stdin. The raw
//! bytes are kept alongside the parsed view because the IPAM plugin must
//! receive the document exactly as the runtime sent it.

use crate::error::{Error, Result};
use crate::result::SUPPORTED_VERSIONS;
use serde::Deserialize;

/// Load a network configuration from the raw stdin payload
pub fn load(bytes: &[u8]) -> Result<NetConf> {
    let conf: NetConf = serde_json::from_slice(bytes)?;
    conf.validate()?;
    Ok(conf)
}

/// Root network configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NetConf {
    /// CNI version the runtime is speaking
    #[serde(rename = "cniVersion")]
    pub cni_version: Option<String>,

    /// Network name
    #[serde(default)]
    pub name: String,

    /// Plugin type (this plugin's binary name)
    #[serde(rename = "type", default)]
    pub plugin: String,

    /// Host bridge to attach containers to
    #[serde(default = "default_bridge")]
    pub bridge: String,

    /// MTU for both legs of the veth pair
    #[serde(default = "default_mtu")]
    pub mtu: u32,

    /// Hairpin mode on the host-side bridge port
    #[serde(rename = "hairpinMode", default)]
    pub hairpin_mode: bool,

    /// Address allocation settings
    pub ipam: IpamConf,
}

/// IPAM section of the configuration
///
/// Only the plugin type is read here; every other key belongs to the IPAM
/// plugin and travels to it inside the raw document.
#[derive(Debug, Clone, Deserialize)]
pub struct IpamConf {
    #[serde(rename = "type", default)]
    pub plugin: String,
}

impl NetConf {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = &self.cni_version {
            if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
                return Err(Error::IncompatibleVersion(version.clone()));
            }
        }

        if self.ipam.plugin.is_empty() {
            return Err(Error::ConfigInvalid("ipam.type is required".into()));
        }

        // The IPAM type is resolved inside CNI_PATH, never as a path
        if self.ipam.plugin.contains('/') || self.ipam.plugin.starts_with('.') {
            return Err(Error::ConfigInvalid(format!(
                "Invalid IPAM plugin name '{}'",
                self.ipam.plugin
            )));
        }

        if self.bridge.is_empty() {
            return Err(Error::ConfigInvalid("bridge name must not be empty".into()));
        }

        // IFNAMSIZ is 16 including the terminator
        if self.bridge.len() > 15 {
            return Err(Error::ConfigInvalid(format!(
                "Bridge name too long: {} (max 15 chars)",
                self.bridge
            )));
        }

        if !(68..=65535).contains(&self.mtu) {
            return Err(Error::ConfigInvalid(format!(
                "MTU {} out of range (68-65535)",
                self.mtu
            )));
        }

        Ok(())
    }
}

fn default_bridge() -> String {
    "docker0".to_string()
}

fn default_mtu() -> u32 {
    1400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let conf = load(br#"{"name": "rancher", "type": "gangway", "ipam": {"type": "host-local"}}"#)
            .unwrap();

        assert_eq!(conf.bridge, "docker0");
        assert_eq!(conf.mtu, 1400);
        assert!(!conf.hairpin_mode);
        assert_eq!(conf.ipam.plugin, "host-local");
        assert_eq!(conf.cni_version, None);
    }

    #[test]
    fn test_full_config() {
        let conf = load(
            br#"{
                "cniVersion": "0.2.0",
                "name": "net",
                "type": "gangway",
                "bridge": "br0",
                "mtu": 9000,
                "hairpinMode": true,
                "ipam": {"type": "host-local", "subnet": "10.0.0.0/24"}
            }"#,
        )
        .unwrap();

        assert_eq!(conf.bridge, "br0");
        assert_eq!(conf.mtu, 9000);
        assert!(conf.hairpin_mode);
    }

    #[test]
    fn test_missing_ipam_rejected() {
        let err = load(br#"{"name": "net", "type": "gangway"}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigDecode(_)));

        let err = load(br#"{"name": "net", "ipam": {}}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_ipam_path_rejected() {
        let err = load(br#"{"ipam": {"type": "../../bin/sh"}}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let err = load(br#"{"cniVersion": "9.9.9", "ipam": {"type": "host-local"}}"#).unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion(v) if v == "9.9.9"));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(load(b"not json"), Err(Error::ConfigDecode(_))));
    }

    #[test]
    fn test_mtu_range() {
        let err = load(br#"{"mtu": 20, "ipam": {"type": "host-local"}}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }
}
