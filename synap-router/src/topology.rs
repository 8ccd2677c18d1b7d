//! Cluster Topology Management
//!
//! Owns the slot → node binding for all 16384 slots and the deduplicated set of
//! distinct nodes behind them.
//!
//! The table is copy-on-write: readers clone the current snapshot `Arc` under a
//! momentary read lock and route without holding any lock, writers are serialized
//! and publish a complete new snapshot in a single store. A node evicted from the
//! table is retired rather than closed in place; it is closed when the last
//! snapshot or in-flight request holding it lets go.

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::hash_slot::HashSlot;
use crate::node::NodeHandle;
use crate::nodes_conf::{NodeConfParser, SlotLayout};
use crate::types::{NodeAddress, TOTAL_SLOTS};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Factory opening a node handle for an address
pub type Connector<N> = Box<
    dyn Fn(&NodeAddress, &RouterConfig) -> std::result::Result<N, <N as NodeHandle>::Error>
        + Send
        + Sync,
>;

/// A node handle as bound into the topology
///
/// Identity is the topology-assigned id: a handle reopened for the same address is
/// a different endpoint.
pub struct Endpoint<N: NodeHandle> {
    id: u64,
    handle: N,
    closed: AtomicBool,
    retired: AtomicBool,
}

impl<N: NodeHandle> Endpoint<N> {
    fn new(id: u64, handle: N) -> Self {
        Self {
            id,
            handle,
            closed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> &N {
        &self.handle
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the endpoint has been evicted from the topology
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Close the handle; later calls are no-ops
    pub(crate) fn close_once(&self) -> std::result::Result<(), N::Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.handle.close()
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl<N: NodeHandle> Deref for Endpoint<N> {
    type Target = N;

    fn deref(&self) -> &N {
        &self.handle
    }
}

impl<N: NodeHandle> Drop for Endpoint<N> {
    fn drop(&mut self) {
        if self.is_retired() && !self.is_closed() {
            debug!("Closing retired node {} (#{})", self.handle.address(), self.id);
            // Pipelined commands must reach the node before it goes away
            if let Err(e) = self.handle.flush() {
                warn!(
                    "Failed to flush retired node {}: {}",
                    self.handle.address(),
                    e
                );
            }
            if let Err(e) = self.close_once() {
                warn!(
                    "Failed to close retired node {}: {}",
                    self.handle.address(),
                    e
                );
            }
        }
    }
}

impl<N: NodeHandle> fmt::Debug for Endpoint<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("address", self.handle.address())
            .field("closed", &self.is_closed())
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Dedup-set entry: a distinct node and how many slots it serves
struct Member<N: NodeHandle> {
    endpoint: Arc<Endpoint<N>>,
    slot_count: usize,
}

impl<N: NodeHandle> Clone for Member<N> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            slot_count: self.slot_count,
        }
    }
}

/// Immutable routing table published by the topology
struct Snapshot<N: NodeHandle> {
    slots: Vec<Arc<Endpoint<N>>>,
    members: BTreeMap<u64, Member<N>>,
}

impl<N: NodeHandle> Clone for Snapshot<N> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            members: self.members.clone(),
        }
    }
}

impl<N: NodeHandle> Snapshot<N> {
    /// Bind `slot` to `endpoint`; returns the previous node if no slot references it now
    fn bind(&mut self, slot: HashSlot, endpoint: Arc<Endpoint<N>>) -> Option<Arc<Endpoint<N>>> {
        let old = std::mem::replace(&mut self.slots[slot.index()], Arc::clone(&endpoint));
        if old.id == endpoint.id {
            return None;
        }

        self.members
            .entry(endpoint.id)
            .or_insert_with(|| Member {
                endpoint,
                slot_count: 0,
            })
            .slot_count += 1;

        let member = self.members.get_mut(&old.id)?;
        member.slot_count -= 1;
        if member.slot_count > 0 {
            return None;
        }
        self.members.remove(&old.id);
        Some(old)
    }

    fn find_by_address(&self, address: &NodeAddress) -> Option<&Arc<Endpoint<N>>> {
        self.members
            .values()
            .map(|m| &m.endpoint)
            .find(|e| e.address() == address)
    }
}

/// Per-node view of the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: u64,
    pub address: NodeAddress,
    pub slots: usize,
}

/// Cluster topology: slot → node table plus the distinct node set
pub struct ClusterTopology<N: NodeHandle> {
    current: RwLock<Arc<Snapshot<N>>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
    closed: AtomicBool,
    config: RouterConfig,
    connector: Connector<N>,
}

impl<N: NodeHandle> ClusterTopology<N> {
    /// Build from node configuration lines, opening nodes with `NodeHandle::connect`
    pub fn connect<I, S>(lines: I, config: RouterConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(lines, config, Box::new(N::connect))
    }

    /// Build from node configuration lines with a custom connector
    ///
    /// Slot coverage is validated before any node is opened. If opening a node fails,
    /// the nodes already opened are closed and the error is returned.
    pub fn build<I, S>(lines: I, config: RouterConfig, connector: Connector<N>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        config.validate()?;
        let entries = NodeConfParser::parse(lines)?;
        let layout = SlotLayout::from_entries(&entries)?;

        let mut endpoints: Vec<Arc<Endpoint<N>>> = Vec::with_capacity(layout.addresses.len());
        for (idx, address) in layout.addresses.iter().enumerate() {
            match connector(address, &config) {
                Ok(handle) => endpoints.push(Arc::new(Endpoint::new(idx as u64, handle))),
                Err(e) => {
                    for endpoint in &endpoints {
                        if let Err(close_err) = endpoint.close_once() {
                            warn!("Failed to close node {}: {}", endpoint.address(), close_err);
                        }
                    }
                    return Err(RouterError::node(address, e));
                }
            }
        }

        let mut counts = vec![0usize; endpoints.len()];
        for &owner in &layout.owners {
            counts[owner] += 1;
        }

        let slots = layout
            .owners
            .iter()
            .map(|&owner| Arc::clone(&endpoints[owner]))
            .collect();
        let members = endpoints
            .into_iter()
            .zip(counts)
            .map(|(endpoint, slot_count)| {
                (
                    endpoint.id,
                    Member {
                        endpoint,
                        slot_count,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        info!(
            "Built cluster topology: {} nodes covering {} slots",
            members.len(),
            TOTAL_SLOTS
        );

        Ok(Self {
            next_id: AtomicU64::new(members.len() as u64),
            current: RwLock::new(Arc::new(Snapshot { slots, members })),
            writer: Mutex::new(()),
            closed: AtomicBool::new(false),
            config,
            connector,
        })
    }

    fn snapshot(&self) -> Arc<Snapshot<N>> {
        Arc::clone(&self.current.read())
    }

    fn publish(&self, snapshot: Snapshot<N>) {
        *self.current.write() = Arc::new(snapshot);
    }

    fn next_endpoint(&self, handle: N) -> Arc<Endpoint<N>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(Endpoint::new(id, handle))
    }

    /// Router settings the topology was built with
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Node currently bound to `slot`
    pub fn lookup(&self, slot: HashSlot) -> Arc<Endpoint<N>> {
        Arc::clone(&self.current.read().slots[slot.index()])
    }

    /// Rebind `slot` from `old` to a new handle
    ///
    /// `old` keeps serving its other slots; it leaves the node set only when this was
    /// its last slot. Fails with `StaleBinding` if `slot` is no longer bound to `old`.
    pub fn replace(
        &self,
        slot: HashSlot,
        old: &Arc<Endpoint<N>>,
        new: N,
    ) -> Result<Arc<Endpoint<N>>> {
        let _writer = self.writer.lock();
        self.ensure_open()?;

        let current = self.snapshot();
        if !Arc::ptr_eq(&current.slots[slot.index()], old) {
            return Err(RouterError::StaleBinding { slot: slot.value() });
        }

        let endpoint = self.next_endpoint(new);
        self.install(&current, slot, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Replace the node bound to `slot` with a fresh handle for the same address
    pub fn renew(&self, slot: HashSlot) -> Result<Arc<Endpoint<N>>> {
        let _writer = self.writer.lock();
        self.ensure_open()?;

        let current = self.snapshot();
        let old = &current.slots[slot.index()];
        let fresh = old
            .reopen()
            .map_err(|e| RouterError::node(old.address(), e))?;

        let endpoint = self.next_endpoint(fresh);
        self.install(&current, slot, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Bind `slot` to the node at `address`, reusing a live node for that address
    pub fn rebind(&self, slot: HashSlot, address: &NodeAddress) -> Result<Arc<Endpoint<N>>> {
        let _writer = self.writer.lock();
        self.ensure_open()?;

        let current = self.snapshot();
        let bound = &current.slots[slot.index()];
        if bound.address() == address {
            return Ok(Arc::clone(bound));
        }

        let endpoint = match current.find_by_address(address) {
            Some(existing) => Arc::clone(existing),
            None => {
                let handle = (self.connector)(address, &self.config)
                    .map_err(|e| RouterError::node(address, e))?;
                self.next_endpoint(handle)
            }
        };
        self.install(&current, slot, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Publish `current` with `slot` rebound; caller holds the writer lock
    fn install(&self, current: &Snapshot<N>, slot: HashSlot, endpoint: Arc<Endpoint<N>>) {
        let mut next = current.clone();
        let new_id = endpoint.id;
        let old_id = next.slots[slot.index()].id;
        let evicted = next.bind(slot, endpoint);
        self.publish(next);

        debug!("Slot {} rebound from node #{} to #{}", slot, old_id, new_id);
        if let Some(old) = evicted {
            debug!("Node {} (#{}) serves no slots, retiring", old.address(), old.id);
            old.retire();
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }
        Ok(())
    }

    /// Visit every distinct node once
    pub fn for_each_node<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Endpoint<N>>),
    {
        let current = self.snapshot();
        for member in current.members.values() {
            f(&member.endpoint);
        }
    }

    /// Distinct nodes of the current table
    pub fn nodes(&self) -> Vec<Arc<Endpoint<N>>> {
        let mut nodes = Vec::new();
        self.for_each_node(|e| nodes.push(Arc::clone(e)));
        nodes
    }

    /// Whether `endpoint` is still in the node set
    pub fn contains(&self, endpoint: &Arc<Endpoint<N>>) -> bool {
        self.snapshot()
            .members
            .get(&endpoint.id)
            .is_some_and(|m| Arc::ptr_eq(&m.endpoint, endpoint))
    }

    /// Number of slots bound to `endpoint`
    pub fn slots_of(&self, endpoint: &Arc<Endpoint<N>>) -> usize {
        self.snapshot()
            .members
            .get(&endpoint.id)
            .map_or(0, |m| m.slot_count)
    }

    pub fn slot_count(&self) -> usize {
        self.snapshot().slots.len()
    }

    pub fn node_count(&self) -> usize {
        self.snapshot().members.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Per-node slot counts
    pub fn summary(&self) -> Vec<NodeSummary> {
        self.snapshot()
            .members
            .values()
            .map(|m| NodeSummary {
                id: m.endpoint.id,
                address: m.endpoint.address().clone(),
                slots: m.slot_count,
            })
            .collect()
    }

    /// Close every distinct node once
    ///
    /// Every node is attempted; the first failure is returned. Later calls are no-ops.
    pub fn close(&self) -> std::result::Result<(), N::Error> {
        let _writer = self.writer.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_err = None;
        let mut count = 0;
        self.for_each_node(|endpoint| {
            count += 1;
            if let Err(e) = endpoint.close_once() {
                warn!("Failed to close node {}: {}", endpoint.address(), e);
                first_err.get_or_insert(e);
            }
        });

        info!("Closed cluster topology ({} nodes)", count);
        first_err.map_or(Ok(()), Err)
    }
}
