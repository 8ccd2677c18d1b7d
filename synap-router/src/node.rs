//! Node handle abstraction
//!
//! A node handle is the per-node pipeline endpoint: it owns the connection, the
//! wire protocol and the pipeline buffer. The router only routes to it.

use crate::config::RouterConfig;
use crate::types::NodeAddress;

/// Per-node pipeline endpoint
///
/// Implementations are shared across threads behind an `Arc`, so every method takes
/// `&self`; a handle that needs mutable connection state keeps it behind its own lock.
pub trait NodeHandle: Send + Sync + Sized + 'static {
    /// Reply returned by a synchronous `send`
    type Reply;

    /// Connection or protocol failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a handle to `address`
    fn connect(address: &NodeAddress, config: &RouterConfig) -> Result<Self, Self::Error>;

    /// Derive a fresh handle for the same network identity
    ///
    /// The existing handle is left untouched; the router retires it once no slot
    /// references it any more.
    fn reopen(&self) -> Result<Self, Self::Error>;

    /// Network identity of this node
    fn address(&self) -> &NodeAddress;

    /// Execute a command and wait for its reply
    fn send(&self, command: &[u8], args: &[&[u8]]) -> Result<Self::Reply, Self::Error>;

    /// Buffer a command in the pipeline; `force` asks the pipeline to flush now
    fn batch(&self, force: bool, command: &[u8], args: &[&[u8]]) -> Result<(), Self::Error>;

    /// Flush pending pipelined commands
    fn flush(&self) -> Result<(), Self::Error>;

    /// Close the connection
    fn close(&self) -> Result<(), Self::Error>;
}
