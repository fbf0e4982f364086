//! Attach/detach orchestration
//!
//! `Plugin` drives one ADD or one DEL from start to finish:
//! - ADD: verify the bridge, plumb a veth pair into the container, enslave
//!   the host leg, allocate an address and configure it inside the container
//! - DEL: release the address, then remove the veth pair
//!
//! ADD stops at the first failure and leaves completed steps in place. DEL
//! is safe to repeat: whatever is already gone counts as removed.

pub mod state;

#[cfg(test)]
mod fake;

use crate::error::{Error, Result};
use crate::ipam::Ipam;
use crate::netconf::{self, NetConf};
use crate::network::ip::configure_iface;
use crate::network::{Bridge, LinkOps, VethPair};
use crate::result::{CniResult, CNI_VERSION};
use ipnet::Ipv4Net;
use state::{AddEvent, AddFlow, DelEvent, DelFlow};
use std::io;
use std::path::{Path, PathBuf};
use tracing::Dispatch;

/// One invocation as handed over by the runtime
#[derive(Debug, Clone, Default)]
pub struct CmdArgs {
    pub container_id: String,
    /// Container network namespace; `None` when the runtime passed none
    pub netns: Option<PathBuf>,
    pub if_name: String,
    pub args: String,
    /// Directories searched for IPAM plugins
    pub path: Vec<PathBuf>,
    /// NetConf exactly as read from stdin
    pub stdin: Vec<u8>,
}

/// What to plumb into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRequest {
    pub netns: PathBuf,
    pub if_name: String,
    pub mtu: u32,
    pub hairpin: bool,
}

impl AttachmentRequest {
    pub fn new(netns: &Path, if_name: &str, conf: &NetConf) -> Self {
        Self {
            netns: netns.to_path_buf(),
            if_name: if_name.to_string(),
            mtu: conf.mtu,
            hairpin: conf.hairpin_mode,
        }
    }
}

/// The bridge plugin, generic over its kernel and IPAM
pub struct Plugin<K: LinkOps, A: Ipam> {
    kernel: K,
    ipam: A,
    /// Sink for every event emitted during an invocation
    dispatch: Dispatch,
}

impl<K: LinkOps, A: Ipam> Plugin<K, A> {
    pub fn new(kernel: K, ipam: A, dispatch: Dispatch) -> Self {
        Self {
            kernel,
            ipam,
            dispatch,
        }
    }

    /// Attach the container to the bridge and give it an address
    ///
    /// Returns `None` when there is no namespace to attach.
    pub fn add(&self, args: &CmdArgs) -> Result<Option<CniResult>> {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = tracing::info_span!(
                "cmdAdd",
                container_id = %args.container_id,
                ifname = %args.if_name
            );
            let _enter = span.enter();

            let mut flow = AddFlow::new();
            let result = self.run_add(args, &mut flow);
            if let Err(e) = &result {
                tracing::error!(error = %e, state = flow.state(), "cmdAdd failed");
                flow.fail();
            }
            result
        })
    }

    /// Release the container's address and remove its veth pair
    pub fn del(&self, args: &CmdArgs) -> Result<()> {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = tracing::info_span!(
                "cmdDel",
                container_id = %args.container_id,
                ifname = %args.if_name
            );
            let _enter = span.enter();

            let mut flow = DelFlow::new();
            let result = self.run_del(args, &mut flow);
            if let Err(e) = &result {
                tracing::error!(error = %e, state = flow.state(), "cmdDel failed");
                flow.fail();
            }
            result
        })
    }

    fn run_add(&self, args: &CmdArgs, flow: &mut AddFlow) -> Result<Option<CniResult>> {
        tracing::info!(netns = ?args.netns, "cmdAdd invoked");

        let conf = netconf::load(&args.stdin)?;
        tracing::debug!(?conf, "netconf loaded");
        flow.advance(AddEvent::Load)?;

        let bridge = Bridge::open(&self.kernel, &conf.bridge)?;
        tracing::debug!(bridge = bridge.name(), index = bridge.index(), "bridge verified");
        flow.advance(AddEvent::Verify)?;

        let Some(netns_path) = &args.netns else {
            tracing::info!("no netns given, nothing to attach");
            flow.advance(AddEvent::Skip)?;
            return Ok(None);
        };

        let request = AttachmentRequest::new(netns_path, &args.if_name, &conf);
        let netns = self.kernel.open_netns(&request.netns)?;

        let veth = VethPair::setup(&self.kernel, &netns, &request.if_name, request.mtu)?;
        flow.advance(AddEvent::Plumb)?;

        bridge.attach(&self.kernel, veth.host_side(), request.hairpin)?;
        flow.advance(AddEvent::Attach)?;

        let mut result = self.ipam.allocate(&conf.ipam.plugin, &args.stdin)?;
        tracing::info!(plugin = %conf.ipam.plugin, ip4 = ?result.ip4, "address allocated");
        flow.advance(AddEvent::Allocate)?;

        if result.ipv4().is_none() {
            return Err(Error::NoUsableAddress {
                plugin: conf.ipam.plugin.clone(),
            });
        }

        let kernel = &self.kernel;
        kernel.with_netns(&netns, || configure_iface(kernel, veth.container_side(), &result))?;
        flow.advance(AddEvent::Configure)?;

        result.cni_version = Some(
            conf.cni_version
                .clone()
                .unwrap_or_else(|| CNI_VERSION.to_string()),
        );
        flow.advance(AddEvent::Finish)?;

        Ok(Some(result))
    }

    fn run_del(&self, args: &CmdArgs, flow: &mut DelFlow) -> Result<()> {
        tracing::info!(netns = ?args.netns, "cmdDel invoked");

        let conf = netconf::load(&args.stdin)?;
        flow.advance(DelEvent::Load)?;

        self.ipam.release(&conf.ipam.plugin, &args.stdin)?;
        flow.advance(DelEvent::Release)?;

        let Some(netns_path) = &args.netns else {
            flow.advance(DelEvent::Skip)?;
            return Ok(());
        };

        match self.teardown(netns_path, &args.if_name) {
            Ok(Some(addr)) => tracing::info!(address = %addr, "interface removed"),
            Ok(None) => tracing::debug!("interface already gone"),
            Err(e) => tracing::warn!(error = %e, "teardown failed, ignoring"),
        }
        flow.advance(DelEvent::Remove)?;
        flow.advance(DelEvent::Finish)?;

        Ok(())
    }

    /// Remove the container interface, treating a vanished namespace as done
    fn teardown(&self, netns_path: &Path, if_name: &str) -> Result<Option<Ipv4Net>> {
        let netns = match self.kernel.open_netns(netns_path) {
            Ok(netns) => netns,
            Err(Error::NamespaceOpen { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        VethPair::teardown(&self.kernel, &netns, if_name)
    }
}
