//! Veth pair management for container namespaces
//!
//! The pair is created inside the container namespace, then the host leg is
//! moved out to the host namespace. The move changes the host leg's
//! interface index, so it is always looked up again by name afterwards.

use crate::error::{Error, Result};
use crate::network::link::LinkOps;
use ipnet::Ipv4Net;

/// How many random host-side names to try before giving up
const MAX_NAME_ATTEMPTS: usize = 8;

/// A veth pair connecting a container namespace to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// Interface name inside the container (e.g., "eth0")
    container_side: String,
    /// Interface name on the host (e.g., "veth1a2b3c4d")
    host_side: String,
}

impl VethPair {
    /// Create the pair in `netns` and move the host leg to the host namespace
    ///
    /// Both legs are up when this returns. Nothing is attached to a bridge.
    pub fn setup<K: LinkOps>(
        kernel: &K,
        netns: &K::Netns,
        if_name: &str,
        mtu: u32,
    ) -> Result<Self> {
        let host_side = Self::free_host_name(kernel, if_name)?;

        kernel.with_netns(netns, || {
            kernel
                .add_veth(if_name, &host_side, mtu)
                .map_err(|e| veth_error(if_name, e))?;
            kernel.set_up(if_name).map_err(|e| veth_error(if_name, e))?;
            kernel
                .move_to_host(&host_side)
                .map_err(|e| veth_error(&host_side, e))
        })?;

        // Index changed during the namespace move; never reuse the old one
        let host_link = kernel
            .link(&host_side)
            .map_err(|e| Error::VethLookup {
                name: host_side.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| Error::VethLookup {
                name: host_side.clone(),
                reason: "no such device after namespace move".to_string(),
            })?;

        // Moving a link between namespaces brings it down
        kernel
            .set_up(&host_link.name)
            .map_err(|e| veth_error(&host_link.name, e))?;

        tracing::debug!(
            container_side = if_name,
            host_side = %host_link.name,
            index = host_link.index,
            mtu,
            "veth pair created"
        );

        Ok(Self {
            container_side: if_name.to_string(),
            host_side: host_link.name,
        })
    }

    /// Delete the container-side interface in `netns`, taking the peer with it
    ///
    /// Returns the IPv4 address that was on the interface. An interface
    /// that is already gone is not an error: `Ok(None)` is returned.
    pub fn teardown<K: LinkOps>(
        kernel: &K,
        netns: &K::Netns,
        if_name: &str,
    ) -> Result<Option<Ipv4Net>> {
        kernel
            .with_netns(netns, || {
                if kernel.link(if_name)?.is_none() {
                    return Ok(None);
                }

                let addr = kernel.ipv4_addrs(if_name)?.into_iter().next();
                kernel.del_link(if_name)?;
                Ok(addr)
            })
            .map_err(|e| Error::Teardown {
                name: if_name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Get the container-side interface name
    pub fn container_side(&self) -> &str {
        &self.container_side
    }

    /// Get the host-side interface name
    pub fn host_side(&self) -> &str {
        &self.host_side
    }

    /// Pick a random host-side name not already taken in the host namespace
    fn free_host_name<K: LinkOps>(kernel: &K, if_name: &str) -> Result<String> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = Self::random_name();
            let taken = kernel
                .link(&name)
                .map_err(|e| veth_error(if_name, e))?
                .is_some();
            if !taken {
                return Ok(name);
            }
        }

        Err(Error::VethCreate {
            name: if_name.to_string(),
            reason: format!(
                "no free host-side name after {} attempts",
                MAX_NAME_ATTEMPTS
            ),
        })
    }

    /// Generate a host-side name: "veth" followed by 8 hex digits
    ///
    /// Interface names have a max length of 15 characters on Linux.
    fn random_name() -> String {
        let bytes: [u8; 4] = rand::random();
        format!(
            "veth{:02x}{:02x}{:02x}{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

fn veth_error(name: &str, err: Error) -> Error {
    Error::VethCreate {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
