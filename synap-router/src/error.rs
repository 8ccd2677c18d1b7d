//! Error types for the cluster router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Boxed node-level failure carried through router operations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Router error types
#[derive(Error, Debug)]
pub enum RouterError {
    /// Malformed node configuration or router settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsed configuration does not cover the full slot space
    #[error("slots size : {found}, expected 16384")]
    SlotCoverage { found: usize },

    /// Slot index outside 0..16384
    #[error("Invalid slot: {0}")]
    InvalidSlot(u16),

    /// Node address that is not `host:port`
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    /// Slot was rebound by another writer before this replacement ran
    #[error("Slot {slot} is no longer bound to the expected node")]
    StaleBinding { slot: u16 },

    /// Failure reported by a node while connecting, reopening or closing it
    #[error("Node {address} failed: {source}")]
    Node {
        address: String,
        #[source]
        source: BoxError,
    },

    /// Topology was already closed
    #[error("Router is closed")]
    Closed,

    /// Reply text that is not a MOVED/ASK redirect
    #[error("Invalid redirect: {0}")]
    InvalidRedirect(String),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error while reading configuration
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RouterError {
    /// Wrap a node failure with the address it came from
    pub fn node<E>(address: impl ToString, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Node {
            address: address.to_string(),
            source: Box::new(source),
        }
    }
}
