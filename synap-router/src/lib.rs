//! # Synap Router
//!
//! Slot-aware command routing for Redis-compatible sharded clusters.
//!
//! - **Hash slots**: CRC16/XMODEM & 16383 with `{tag}` co-location
//! - **Topology**: 16384 slots bound to node handles, copy-on-write, reference counted
//! - **Dispatch**: `send` / `batch` / `flush` routed per key, `close` once per node
//! - **Healing**: `update` and MOVED redirects rebind a single slot
//!
//! The node handle (connection, wire protocol, pipeline buffer) is supplied by the
//! caller through the [`NodeHandle`] trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use synap_router::{RouterConfig, RoutingDispatcher};
//!
//! let lines = std::fs::read_to_string("nodes.conf")?;
//! let router: RoutingDispatcher<MyConnection> =
//!     RoutingDispatcher::new(lines.lines(), RouterConfig::from_file("router.yml")?)?;
//!
//! router.send(b"SET", &[b"{user1}:profile", b"v"])?;
//! router.batch(false, b"INCR", &[b"{user1}:visits"])?;
//! router.flush()?;
//!
//! synap_router::shutdown_quietly(Some(&router));
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hash_slot;
pub mod metrics;
pub mod node;
pub mod nodes_conf;
pub mod redirect;
pub mod topology;
pub mod types;

#[cfg(test)]
mod mock;

pub use config::{ConnectionConfig, RouterConfig};
pub use dispatcher::{RoutingDispatcher, shutdown, shutdown_quietly};
pub use error::{Result, RouterError};
pub use hash_slot::{HashSlot, hash_slot, slot};
pub use metrics::{Counter, CounterSnapshot, DispatchMetrics, DispatchStats};
pub use node::NodeHandle;
pub use nodes_conf::{NodeConfParser, NodeEntry, SlotLayout};
pub use redirect::{Redirect, RedirectKind};
pub use topology::{ClusterTopology, Connector, Endpoint, NodeSummary};
pub use types::{NodeAddress, SlotRange, TOTAL_SLOTS};
