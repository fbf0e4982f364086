//! Diagnostic log sink
//!
//! The runtime owns stdout and stderr, so diagnostics go to a fixed file.
//! The subscriber is never installed process-wide: callers get a
//! `Dispatch` and scope it around the work they do. Logging is best
//! effort and a file that cannot be opened yields a dispatcher that
//! discards everything.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Where diagnostics are appended
pub const LOG_FILE: &str = "/tmp/gangway-cni.log";

/// Environment variable holding the log filter (e.g. "info", "gangway=trace")
pub const LOG_ENV: &str = "GANGWAY_LOG";

const DEFAULT_FILTER: &str = "debug";

/// Open the log file at `path` and build a dispatcher writing to it
pub fn open(path: &Path) -> Dispatch {
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(_) => return Dispatch::none(),
    };

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .with_env_filter(filter)
        .finish();

    Dispatch::new(subscriber)
}
