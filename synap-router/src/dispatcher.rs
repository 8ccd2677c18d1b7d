//! Routing dispatcher
//!
//! Routes each command to the node owning its key's slot. The first argument of a
//! command is its routing key; a command without arguments routes to slot 0.
//!
//! All operations are synchronous. Node errors from `send`, `batch`, `flush` and
//! `close` are returned unmodified so the caller can recognise redirects and heal
//! the table with [`RoutingDispatcher::update`] or [`RoutingDispatcher::apply_redirect`].

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::hash_slot::{self, HashSlot};
use crate::metrics::{DispatchMetrics, DispatchStats};
use crate::node::NodeHandle;
use crate::redirect::{Redirect, RedirectKind};
use crate::topology::{ClusterTopology, Connector, Endpoint, NodeSummary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Slot-aware command router over a cluster topology
pub struct RoutingDispatcher<N: NodeHandle> {
    topology: ClusterTopology<N>,
    metrics: DispatchMetrics,
}

impl<N: NodeHandle> RoutingDispatcher<N> {
    /// Build from node configuration lines, opening nodes with `NodeHandle::connect`
    ///
    /// Fails if the lines do not cover all 16384 slots.
    pub fn new<I, S>(lines: I, config: RouterConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::from_topology(ClusterTopology::connect(lines, config)?))
    }

    /// Build with a custom connector, also used for nodes learned from redirects
    pub fn with_connector<I, S>(
        lines: I,
        config: RouterConfig,
        connector: Connector<N>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let topology = ClusterTopology::build(lines, config, connector)?;
        Ok(Self::from_topology(topology))
    }

    pub fn from_topology(topology: ClusterTopology<N>) -> Self {
        Self {
            topology,
            metrics: DispatchMetrics::default(),
        }
    }

    fn route(args: &[&[u8]]) -> HashSlot {
        hash_slot::slot(args.first().copied())
    }

    /// Execute a command on the node owning `args[0]` and return its reply
    pub fn send(&self, command: &[u8], args: &[&[u8]]) -> std::result::Result<N::Reply, N::Error> {
        let start = Instant::now();
        let endpoint = self.topology.lookup(Self::route(args));
        let reply = endpoint.send(command, args);
        self.metrics.sends.add(1, start.elapsed());
        reply
    }

    /// Pipeline a command on the node owning `args[0]`
    ///
    /// `force` is passed to the node, which decides whether to flush now.
    pub fn batch(
        &self,
        force: bool,
        command: &[u8],
        args: &[&[u8]],
    ) -> std::result::Result<(), N::Error> {
        let start = Instant::now();
        let endpoint = self.topology.lookup(Self::route(args));
        let result = endpoint.batch(force, command, args);
        self.metrics.batches.add(1, start.elapsed());
        result
    }

    /// Flush the pipeline of every distinct node
    ///
    /// Every node is flushed even if an earlier one fails; the first failure is
    /// returned. Connections stay open.
    pub fn flush(&self) -> std::result::Result<(), N::Error> {
        let start = Instant::now();
        let mut first_err = None;
        let mut flushed = 0;
        self.topology.for_each_node(|endpoint| {
            flushed += 1;
            if let Err(e) = endpoint.flush() {
                warn!("Failed to flush node {}: {}", endpoint.address(), e);
                first_err.get_or_insert(e);
            }
        });
        self.metrics.flushes.add(flushed, start.elapsed());
        first_err.map_or(Ok(()), Err)
    }

    /// Replace the owner of `key`'s slot with a fresh handle for the same address
    ///
    /// Used after a node reports that its connection state for the slot is stale.
    pub fn update(&self, key: &[u8]) -> Result<()> {
        let slot = HashSlot::from_key(key);
        let endpoint = self.topology.renew(slot)?;
        debug!("Renewed node {} for slot {}", endpoint.address(), slot);
        Ok(())
    }

    /// Apply a MOVED redirect to the routing table
    ///
    /// ASK redirects are one-shot and leave the table untouched.
    pub fn apply_redirect(&self, redirect: &Redirect) -> Result<()> {
        if redirect.kind == RedirectKind::Ask {
            return Ok(());
        }
        let endpoint = self.topology.rebind(redirect.slot, &redirect.address)?;
        info!("Slot {} moved to {}", redirect.slot, endpoint.address());
        Ok(())
    }

    /// Close every distinct node once; see [`ClusterTopology::close`]
    pub fn close(&self) -> std::result::Result<(), N::Error> {
        self.topology.close()
    }

    /// Node currently serving `key`
    pub fn node_for_key(&self, key: &[u8]) -> Arc<Endpoint<N>> {
        self.topology.lookup(HashSlot::from_key(key))
    }

    pub fn topology(&self) -> &ClusterTopology<N> {
        &self.topology
    }

    pub fn summary(&self) -> Vec<NodeSummary> {
        self.topology.summary()
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> DispatchStats {
        self.metrics.totals()
    }
}

/// Close a dispatcher, surfacing the first node failure
///
/// Every node is closed before the failure is reported. `None` is a no-op.
pub fn shutdown<N: NodeHandle>(dispatcher: Option<&RoutingDispatcher<N>>) -> Result<()> {
    let Some(dispatcher) = dispatcher else {
        return Ok(());
    };
    dispatcher.close().map_err(|e| RouterError::Node {
        address: "cluster".to_string(),
        source: Box::new(e),
    })
}

/// Close a dispatcher, logging and discarding node failures. `None` is a no-op.
pub fn shutdown_quietly<N: NodeHandle>(dispatcher: Option<&RoutingDispatcher<N>>) {
    if let Err(e) = shutdown(dispatcher) {
        warn!("Ignoring failure during shutdown: {}", e);
    }
}
