//! Interface address configuration
//!
//! Applies an IPAM result to the container-side interface. Must be called
//! from inside the container namespace.

use crate::error::{Error, Result};
use crate::network::link::LinkOps;
use crate::result::CniResult;
use ipnet::IpNet;

/// Bring `if_name` up and apply the IPv4 address and routes from `result`
///
/// A route without its own gateway goes via the `ip4` gateway, and out of
/// the interface directly if there is none.
pub fn configure_iface<K: LinkOps>(kernel: &K, if_name: &str, result: &CniResult) -> Result<()> {
    let configure_err = |reason: String| Error::Configure {
        name: if_name.to_string(),
        reason,
    };

    let ip4 = result
        .ip4
        .as_ref()
        .ok_or_else(|| configure_err("no IPv4 configuration".to_string()))?;
    let addr = result
        .ipv4()
        .ok_or_else(|| configure_err(format!("{} is not an IPv4 network", ip4.ip)))?;

    if kernel
        .link(if_name)
        .map_err(|e| configure_err(e.to_string()))?
        .is_none()
    {
        return Err(configure_err("interface vanished".to_string()));
    }

    kernel
        .set_up(if_name)
        .map_err(|e| configure_err(e.to_string()))?;

    kernel
        .add_addr(if_name, IpNet::V4(addr))
        .map_err(|e| configure_err(format!("failed to add {}: {}", addr, e)))?;

    for route in &ip4.routes {
        let via = route.gw.or(ip4.gateway);
        kernel
            .add_route(if_name, route.dst, via)
            .map_err(|e| configure_err(format!("failed to add route {}: {}", route.dst, e)))?;
    }

    tracing::debug!(
        interface = if_name,
        address = %addr,
        routes = ip4.routes.len(),
        "interface configured"
    );

    Ok(())
}
