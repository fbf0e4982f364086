//! Network plumbing for container attachment
//!
//! Provides:
//! - The kernel capability interface (`LinkOps`) and its iproute2 backend
//! - Scoped network namespace entry
//! - Bridge lookup and port attachment
//! - Veth pair provisioning and teardown
//! - Interface address configuration

pub mod bridge;
pub mod iproute;
pub mod ip;
pub mod link;
pub mod netns;
pub mod veth;

#[cfg(test)]
pub mod fake;

pub use bridge::Bridge;
pub use iproute::IpRoute2;
pub use link::LinkOps;
pub use veth::VethPair;
