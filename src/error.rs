//! Unified error types for Gangway
//!
//! Every variant maps onto a CNI error code so a failed invocation can be
//! reported to the container runtime as an error document.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// CNI well-known error codes
pub mod code {
    pub const INCOMPATIBLE_VERSION: u32 = 1;
    pub const INVALID_ENVIRONMENT: u32 = 4;
    pub const IO_FAILURE: u32 = 5;
    pub const DECODING_FAILURE: u32 = 6;
    pub const INVALID_NETWORK_CONFIG: u32 = 7;

    // Plugin-specific codes start at 100
    pub const BRIDGE_MISSING: u32 = 101;
    pub const BRIDGE_WRONG_KIND: u32 = 102;
    pub const NAMESPACE: u32 = 103;
    pub const VETH_CREATE: u32 = 104;
    pub const VETH_LOOKUP: u32 = 105;
    pub const ATTACH: u32 = 106;
    pub const HAIRPIN: u32 = 107;
    pub const ALLOCATION: u32 = 108;
    pub const NO_USABLE_ADDRESS: u32 = 109;
    pub const CONFIGURE: u32 = 110;
    pub const RELEASE: u32 = 111;
    pub const TEARDOWN: u32 = 112;
    pub const INTERNAL: u32 = 199;
}

/// Main error type for Gangway operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Invocation errors
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("Incompatible CNI version '{0}'")]
    IncompatibleVersion(String),

    // Config errors
    #[error("Failed to decode netconf: {0}")]
    ConfigDecode(#[from] serde_json::Error),

    #[error("Invalid netconf: {0}")]
    ConfigInvalid(String),

    // Bridge errors
    #[error("Bridge '{name}' is missing: {reason}")]
    BridgeMissing { name: String, reason: String },

    #[error("'{name}' already exists but is a {kind} device, not a bridge")]
    BridgeWrongKind { name: String, kind: String },

    // Namespace errors
    #[error("Failed to open netns '{path}': {source}")]
    NamespaceOpen { path: PathBuf, source: io::Error },

    #[error("Failed to enter netns '{path}': {reason}")]
    NamespaceEnter { path: PathBuf, reason: String },

    // Veth errors
    #[error("Failed to create veth pair for '{name}': {reason}")]
    VethCreate { name: String, reason: String },

    #[error("Failed to lookup '{name}': {reason}")]
    VethLookup { name: String, reason: String },

    #[error("Failed to connect '{name}' to bridge '{bridge}': {reason}")]
    Attach {
        name: String,
        bridge: String,
        reason: String,
    },

    #[error("Failed to set hairpin mode for '{name}': {reason}")]
    Hairpin { name: String, reason: String },

    // Address errors
    #[error("IPAM plugin '{plugin}' failed to allocate: {message}")]
    Allocation {
        plugin: String,
        code: u32,
        message: String,
    },

    #[error("IPAM plugin '{plugin}' returned missing IPv4 config")]
    NoUsableAddress { plugin: String },

    #[error("Failed to configure '{name}': {reason}")]
    Configure { name: String, reason: String },

    #[error("IPAM plugin '{plugin}' failed to release: {message}")]
    Release {
        plugin: String,
        code: u32,
        message: String,
    },

    #[error("Failed to tear down '{name}': {reason}")]
    Teardown { name: String, reason: String },

    // System errors
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Invalid state transition: {0}")]
    StateTransition(String),
}

impl Error {
    /// CNI error code reported to the runtime
    pub fn code(&self) -> u32 {
        match self {
            Error::Io(_) => code::IO_FAILURE,
            Error::InvalidInvocation(_) => code::INVALID_ENVIRONMENT,
            Error::IncompatibleVersion(_) => code::INCOMPATIBLE_VERSION,
            Error::ConfigDecode(_) => code::DECODING_FAILURE,
            Error::ConfigInvalid(_) => code::INVALID_NETWORK_CONFIG,
            Error::BridgeMissing { .. } => code::BRIDGE_MISSING,
            Error::BridgeWrongKind { .. } => code::BRIDGE_WRONG_KIND,
            Error::NamespaceOpen { .. } | Error::NamespaceEnter { .. } => code::NAMESPACE,
            Error::VethCreate { .. } => code::VETH_CREATE,
            Error::VethLookup { .. } => code::VETH_LOOKUP,
            Error::Attach { .. } => code::ATTACH,
            Error::Hairpin { .. } => code::HAIRPIN,
            // IPAM plugins report their own codes; pass them through
            Error::Allocation { code, .. } if *code != 0 => *code,
            Error::Allocation { .. } => code::ALLOCATION,
            Error::NoUsableAddress { .. } => code::NO_USABLE_ADDRESS,
            Error::Configure { .. } => code::CONFIGURE,
            Error::Release { code, .. } if *code != 0 => *code,
            Error::Release { .. } => code::RELEASE,
            Error::Teardown { .. } => code::TEARDOWN,
            Error::CommandFailed { .. } | Error::StateTransition(_) => code::INTERNAL,
        }
    }

    /// Short name of the failure class, reported as the error `details`
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "Io",
            Error::InvalidInvocation(_) => "InvalidInvocation",
            Error::IncompatibleVersion(_) => "IncompatibleVersion",
            Error::ConfigDecode(_) | Error::ConfigInvalid(_) => "ConfigInvalid",
            Error::BridgeMissing { .. } => "BridgeMissing",
            Error::BridgeWrongKind { .. } => "BridgeWrongKind",
            Error::NamespaceOpen { .. } => "NamespaceOpenFailed",
            Error::NamespaceEnter { .. } => "NamespaceEnterFailed",
            Error::VethCreate { .. } => "VethCreateFailed",
            Error::VethLookup { .. } => "VethLookupFailed",
            Error::Attach { .. } => "AttachFailed",
            Error::Hairpin { .. } => "HairpinFailed",
            Error::Allocation { .. } => "AllocationFailed",
            Error::NoUsableAddress { .. } => "NoUsableAddress",
            Error::Configure { .. } => "ConfigureFailed",
            Error::Release { .. } => "ReleaseFailed",
            Error::Teardown { .. } => "TeardownFailed",
            Error::CommandFailed { .. } => "CommandFailed",
            Error::StateTransition(_) => "StateTransition",
        }
    }
}

/// Result type alias for Gangway operations
pub type Result<T> = std::result::Result<T, Error>;
