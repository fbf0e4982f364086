//! IPAM double for orchestrator tests
//!
//! Records into the same call log as `FakeKernel`, so tests can check the
//! order of kernel and allocation calls in one sequence.

use crate::error::{Error, Result};
use crate::ipam::Ipam;
use crate::network::fake::CallLog;
use crate::result::CniResult;
use std::sync::Mutex;

pub struct FakeIpam {
    calls: CallLog,
    reply: String,
    release_code: Option<u32>,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl FakeIpam {
    /// An IPAM that answers every ADD with the JSON `reply`
    pub fn new(calls: CallLog, reply: &str) -> Self {
        Self {
            calls,
            reply: reply.to_string(),
            release_code: None,
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Make every release fail with the given CNI code
    pub fn failing_release(mut self, code: u32) -> Self {
        self.release_code = Some(code);
        self
    }

    /// Configuration bytes received so far, in call order
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }

    fn record(&self, op: &str, plugin: &str, config: &[u8]) {
        self.calls.lock().unwrap().push(format!("{} {}", op, plugin));
        self.payloads.lock().unwrap().push(config.to_vec());
    }
}

impl Ipam for FakeIpam {
    fn allocate(&self, plugin: &str, config: &[u8]) -> Result<CniResult> {
        self.record("ipam_add", plugin, config);
        serde_json::from_str(&self.reply).map_err(|e| Error::Allocation {
            plugin: plugin.to_string(),
            code: 0,
            message: e.to_string(),
        })
    }

    fn release(&self, plugin: &str, config: &[u8]) -> Result<()> {
        self.record("ipam_del", plugin, config);
        match self.release_code {
            Some(code) => Err(Error::Release {
                plugin: plugin.to_string(),
                code,
                message: "store unavailable".to_string(),
            }),
            None => Ok(()),
        }
    }
}
