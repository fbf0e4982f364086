//! Bridge lookup and port attachment
//!
//! Provides:
//! - Resolution of an existing host bridge by name
//! - Enslaving a host-side interface to the bridge
//! - Hairpin mode on the resulting bridge port
//!
//! The bridge itself is owned by whoever set up the host; it is never
//! created or destroyed here.

use crate::error::{Error, Result};
use crate::network::link::LinkOps;

/// A handle to an existing bridge interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    /// Bridge interface name (e.g., "docker0")
    name: String,
    /// Interface index at lookup time
    index: u32,
}

impl Bridge {
    /// Open an existing bridge interface
    pub fn open<K: LinkOps>(kernel: &K, name: &str) -> Result<Self> {
        let link = kernel
            .link(name)
            .map_err(|e| Error::BridgeMissing {
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| Error::BridgeMissing {
                name: name.to_string(),
                reason: "no such device".to_string(),
            })?;

        if !link.is_bridge() {
            return Err(Error::BridgeWrongKind {
                name: name.to_string(),
                kind: link.kind.unwrap_or_else(|| "physical".to_string()),
            });
        }

        Ok(Self {
            name: link.name,
            index: link.index,
        })
    }

    /// Get bridge name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get bridge interface index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Attach a host-side interface to the bridge and set its hairpin mode
    ///
    /// The interface is resolved again by name first. Hairpin is set only
    /// once the interface is a bridge port. A hairpin failure leaves the
    /// interface enslaved.
    pub fn attach<K: LinkOps>(&self, kernel: &K, port: &str, hairpin: bool) -> Result<()> {
        let link = kernel
            .link(port)
            .map_err(|e| Error::VethLookup {
                name: port.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| Error::VethLookup {
                name: port.to_string(),
                reason: "no such device".to_string(),
            })?;

        kernel
            .set_master(&link.name, &self.name)
            .map_err(|e| Error::Attach {
                name: link.name.clone(),
                bridge: self.name.clone(),
                reason: e.to_string(),
            })?;

        kernel
            .set_hairpin(&link.name, hairpin)
            .map_err(|e| Error::Hairpin {
                name: link.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            port = %link.name,
            bridge = %self.name,
            hairpin,
            "attached to bridge"
        );

        Ok(())
    }
}
