//! Scoped network namespace entry
//!
//! Namespace membership is per thread. Work that must happen inside a
//! container namespace runs on a dedicated scoped thread that enters the
//! namespace with setns(2), runs the block, and switches back before it
//! exits. The calling thread never leaves the host namespace.

use crate::error::{Error, Result};
use nix::sched::{setns, CloneFlags};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;

/// Path to the calling thread's own network namespace
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// An opened network namespace
#[derive(Debug)]
pub struct NetNs {
    path: PathBuf,
    file: File,
}

impl NetNs {
    /// Open the namespace at `path` (e.g. "/var/run/netns/ns1" or "/proc/<pid>/ns/net")
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::NamespaceOpen {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Get the namespace path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside this namespace on a dedicated thread
    ///
    /// The worker inherits the caller's tracing dispatcher and span so its
    /// events land in the same log.
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send,
    {
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let span = tracing::Span::current();

        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("netns".to_string())
                .spawn_scoped(scope, || {
                    tracing::dispatcher::with_default(&dispatch, || {
                        span.in_scope(|| {
                            let _guard = NsGuard::enter(self)?;
                            f()
                        })
                    })
                })
                .map_err(|e| Error::NamespaceEnter {
                    path: self.path.clone(),
                    reason: format!("Failed to spawn worker thread: {}", e),
                })?;

            worker.join().map_err(|_| Error::NamespaceEnter {
                path: self.path.clone(),
                reason: "Worker thread panicked".to_string(),
            })?
        })
    }
}

/// Holds the thread inside a namespace; switches back on drop
struct NsGuard {
    original: File,
}

impl NsGuard {
    fn enter(target: &NetNs) -> Result<Self> {
        let original = File::open(THREAD_NETNS).map_err(|e| Error::NamespaceEnter {
            path: target.path.clone(),
            reason: format!("Failed to open current netns: {}", e),
        })?;

        setns(&target.file, CloneFlags::CLONE_NEWNET).map_err(|e| Error::NamespaceEnter {
            path: target.path.clone(),
            reason: e.to_string(),
        })?;

        tracing::trace!(netns = %target.path.display(), "entered netns");

        Ok(Self { original })
    }
}

impl Drop for NsGuard {
    fn drop(&mut self) {
        if let Err(e) = setns(&self.original, CloneFlags::CLONE_NEWNET) {
            // The worker thread exits right after this, so the stray
            // namespace dies with it
            tracing::error!(error = %e, "failed to restore original netns");
        }
    }
}
