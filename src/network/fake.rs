//! In-memory kernel for tests
//!
//! Models namespaces as named link tables. Every operation acts on the
//! "current" namespace, which `with_netns` switches for the duration of its
//! block. All calls are appended to a shared log so tests can assert on
//! ordering, including calls made by other test doubles sharing the log.

use crate::error::{Error, Result};
use crate::network::link::{Link, LinkOps};
use ipnet::{IpNet, Ipv4Net};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Name of the host namespace
pub const HOST: &str = "host";

/// Shared, ordered record of calls
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLink {
    pub index: u32,
    pub kind: Option<String>,
    pub master: Option<String>,
    pub hairpin: bool,
    pub up: bool,
    pub mtu: u32,
    pub peer: Option<String>,
    pub addrs: Vec<IpNet>,
    pub routes: Vec<(IpNet, Option<IpAddr>)>,
}

impl FakeLink {
    fn new(index: u32, kind: Option<&str>, mtu: u32) -> Self {
        Self {
            index,
            kind: kind.map(str::to_string),
            master: None,
            hairpin: false,
            up: false,
            mtu,
            peer: None,
            addrs: Vec::new(),
            routes: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct State {
    current: String,
    namespaces: HashMap<String, HashMap<String, FakeLink>>,
    next_index: u32,
    failing: HashSet<&'static str>,
}

impl State {
    fn next_index(&mut self) -> u32 {
        self.next_index += 1;
        self.next_index
    }

    fn links(&mut self) -> &mut HashMap<String, FakeLink> {
        let current = self.current.clone();
        self.namespaces.entry(current).or_default()
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut FakeLink> {
        self.links().get_mut(name).ok_or_else(|| no_device(name))
    }

    /// Locate a veth peer by name in any namespace
    fn peer_namespace(&self, peer: &str) -> Option<String> {
        self.namespaces
            .iter()
            .find(|(_, links)| links.contains_key(peer))
            .map(|(ns, _)| ns.clone())
    }
}

/// In-memory `LinkOps` implementation
pub struct FakeKernel {
    state: Mutex<State>,
    calls: CallLog,
}

impl FakeKernel {
    /// A kernel with only a host namespace holding `lo`
    pub fn new() -> Self {
        let mut host = HashMap::new();
        host.insert("lo".to_string(), FakeLink::new(1, None, 65536));

        let mut namespaces = HashMap::new();
        namespaces.insert(HOST.to_string(), host);

        Self {
            state: Mutex::new(State {
                current: HOST.to_string(),
                namespaces,
                next_index: 1,
                failing: HashSet::new(),
            }),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a bridge device to the host namespace
    pub fn with_bridge(self, name: &str) -> Self {
        self.with_device(name, Some("bridge"))
    }

    /// Add a device of the given kind to the host namespace
    pub fn with_device(self, name: &str, kind: Option<&str>) -> Self {
        {
            let mut state = self.lock();
            let index = state.next_index();
            state
                .namespaces
                .entry(HOST.to_string())
                .or_default()
                .insert(name.to_string(), FakeLink::new(index, kind, 1500));
        }
        self
    }

    /// Add an empty namespace reachable at `path`
    pub fn with_namespace(self, path: &str) -> Self {
        self.lock().namespaces.insert(path.to_string(), HashMap::new());
        self
    }

    /// Make every later call to `op` fail
    pub fn fail_on(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    /// Shared call log, for doubles that record into the same sequence
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn link_in(&self, ns: &str, name: &str) -> Option<FakeLink> {
        self.lock().namespaces.get(ns)?.get(name).cloned()
    }

    /// Total number of links across all namespaces
    pub fn link_count(&self) -> usize {
        self.lock().namespaces.values().map(HashMap::len).sum()
    }

    /// Delete a link (and its peer) behind the plugin's back
    pub fn remove_link(&self, ns: &str, name: &str) {
        let mut state = self.lock();
        let removed = state.namespaces.get_mut(ns).and_then(|links| links.remove(name));
        if let Some(peer) = removed.and_then(|l| l.peer) {
            if let Some(peer_ns) = state.peer_namespace(&peer) {
                if let Some(links) = state.namespaces.get_mut(&peer_ns) {
                    links.remove(&peer);
                }
            }
        }
    }

    /// Destroy a namespace and everything in it
    pub fn remove_namespace(&self, path: &str) {
        self.lock().namespaces.remove(path);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Record a call and fail it if requested
    fn call(&self, op: &'static str, detail: String) -> Result<MutexGuard<'_, State>> {
        self.calls.lock().unwrap().push(format!("{} {}", op, detail));
        let state = self.lock();
        if state.failing.contains(op) {
            return Err(Error::CommandFailed {
                command: op.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(state)
    }
}

fn no_device(name: &str) -> Error {
    Error::CommandFailed {
        command: "fake".to_string(),
        message: format!("Device \"{}\" does not exist.", name),
    }
}

impl LinkOps for FakeKernel {
    type Netns = String;

    fn open_netns(&self, path: &Path) -> Result<String> {
        let key = path.display().to_string();
        if self.lock().namespaces.contains_key(&key) {
            Ok(key)
        } else {
            Err(Error::NamespaceOpen {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
        }
    }

    fn with_netns<T, F>(&self, netns: &String, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send,
    {
        let previous = {
            let mut state = self.lock();
            if !state.namespaces.contains_key(netns) {
                return Err(Error::NamespaceEnter {
                    path: netns.into(),
                    reason: "namespace is gone".to_string(),
                });
            }
            std::mem::replace(&mut state.current, netns.clone())
        };

        let result = f();
        self.lock().current = previous;
        result
    }

    fn link(&self, name: &str) -> Result<Option<Link>> {
        let mut state = self.call("link", name.to_string())?;
        Ok(state.links().get(name).map(|l| Link {
            name: name.to_string(),
            index: l.index,
            kind: l.kind.clone(),
            master: l.master.clone(),
            hairpin: l.master.as_ref().map(|_| l.hairpin),
        }))
    }

    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<()> {
        let mut state = self.call("add_veth", format!("{} {}", name, peer))?;
        if state.links().contains_key(name) || state.links().contains_key(peer) {
            return Err(Error::CommandFailed {
                command: "add_veth".to_string(),
                message: "RTNETLINK answers: File exists".to_string(),
            });
        }

        let (a, b) = (state.next_index(), state.next_index());
        let mut left = FakeLink::new(a, Some("veth"), mtu);
        let mut right = FakeLink::new(b, Some("veth"), mtu);
        left.peer = Some(peer.to_string());
        right.peer = Some(name.to_string());

        let links = state.links();
        links.insert(name.to_string(), left);
        links.insert(peer.to_string(), right);
        Ok(())
    }

    fn move_to_host(&self, name: &str) -> Result<()> {
        let mut state = self.call("move_to_host", name.to_string())?;
        let mut link = state.links().remove(name).ok_or_else(|| no_device(name))?;

        // New namespace, new index; the kernel also downs the link
        link.index = state.next_index();
        link.up = false;
        state
            .namespaces
            .entry(HOST.to_string())
            .or_default()
            .insert(name.to_string(), link);
        Ok(())
    }

    fn set_up(&self, name: &str) -> Result<()> {
        let mut state = self.call("set_up", name.to_string())?;
        state.find_mut(name)?.up = true;
        Ok(())
    }

    fn set_master(&self, name: &str, bridge: &str) -> Result<()> {
        let mut state = self.call("set_master", format!("{} {}", name, bridge))?;
        let is_bridge = state
            .links()
            .get(bridge)
            .is_some_and(|l| l.kind.as_deref() == Some("bridge"));
        if !is_bridge {
            return Err(no_device(bridge));
        }
        state.find_mut(name)?.master = Some(bridge.to_string());
        Ok(())
    }

    fn set_hairpin(&self, name: &str, on: bool) -> Result<()> {
        let mut state = self.call("set_hairpin", format!("{} {}", name, on))?;
        let link = state.find_mut(name)?;
        if link.master.is_none() {
            return Err(Error::CommandFailed {
                command: "set_hairpin".to_string(),
                message: format!("{} is not a bridge port", name),
            });
        }
        link.hairpin = on;
        Ok(())
    }

    fn ipv4_addrs(&self, name: &str) -> Result<Vec<Ipv4Net>> {
        let mut state = self.call("ipv4_addrs", name.to_string())?;
        let link = state.find_mut(name)?;
        Ok(link
            .addrs
            .iter()
            .filter_map(|a| match a {
                IpNet::V4(net) => Some(*net),
                IpNet::V6(_) => None,
            })
            .collect())
    }

    fn add_addr(&self, name: &str, addr: IpNet) -> Result<()> {
        let mut state = self.call("add_addr", format!("{} {}", name, addr))?;
        state.find_mut(name)?.addrs.push(addr);
        Ok(())
    }

    fn add_route(&self, name: &str, dst: IpNet, via: Option<IpAddr>) -> Result<()> {
        let mut state = self.call("add_route", format!("{} {}", name, dst))?;
        state.find_mut(name)?.routes.push((dst, via));
        Ok(())
    }

    fn del_link(&self, name: &str) -> Result<()> {
        let mut state = self.call("del_link", name.to_string())?;
        let link = state.links().remove(name).ok_or_else(|| no_device(name))?;
        if let Some(peer) = link.peer {
            if let Some(peer_ns) = state.peer_namespace(&peer) {
                if let Some(links) = state.namespaces.get_mut(&peer_ns) {
                    links.remove(&peer);
                }
            }
        }
        Ok(())
    }
}
