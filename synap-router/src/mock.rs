//! In-memory node handle for unit tests

use crate::config::RouterConfig;
use crate::node::NodeHandle;
use crate::types::NodeAddress;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

#[derive(Debug, Default)]
struct State {
    sent: Mutex<Vec<String>>,
    pending: Mutex<Vec<String>>,
    flushed: AtomicUsize,
    flush_calls: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

#[derive(Debug)]
pub struct MockNode {
    address: NodeAddress,
    generation: u32,
    pipeline_depth: usize,
    fail_close: bool,
    state: Arc<State>,
}

impl MockNode {
    /// Second handle onto the same recorded state, for observing a node after it
    /// has been handed to the topology
    pub fn share(&self) -> Self {
        Self {
            address: self.address.clone(),
            generation: self.generation,
            pipeline_depth: self.pipeline_depth,
            fail_close: self.fail_close,
            state: Arc::clone(&self.state),
        }
    }

    pub fn refuse(address: &NodeAddress) -> Result<Self, MockError> {
        Err(MockError(format!("{} connection refused", address)))
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().clone()
    }

    pub fn pending(&self) -> usize {
        self.state.pending.lock().len()
    }

    pub fn flushed(&self) -> usize {
        self.state.flushed.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.state.flush_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    fn render(command: &[u8], args: &[&[u8]]) -> String {
        std::iter::once(command)
            .chain(args.iter().copied())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn ensure_open(&self) -> Result<(), MockError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(MockError(format!("{} is closed", self.address)));
        }
        Ok(())
    }

    fn drain(&self) {
        let mut pending = self.state.pending.lock();
        self.state.flushed.fetch_add(pending.len(), Ordering::SeqCst);
        pending.clear();
    }
}

impl NodeHandle for MockNode {
    type Reply = String;
    type Error = MockError;

    fn connect(address: &NodeAddress, config: &RouterConfig) -> Result<Self, MockError> {
        Ok(Self {
            address: address.clone(),
            generation: 0,
            pipeline_depth: config.pipeline_depth,
            fail_close: false,
            state: Arc::default(),
        })
    }

    fn reopen(&self) -> Result<Self, MockError> {
        Ok(Self {
            address: self.address.clone(),
            generation: self.generation + 1,
            pipeline_depth: self.pipeline_depth,
            fail_close: self.fail_close,
            state: Arc::default(),
        })
    }

    fn address(&self) -> &NodeAddress {
        &self.address
    }

    fn send(&self, command: &[u8], args: &[&[u8]]) -> Result<String, MockError> {
        self.ensure_open()?;
        let line = Self::render(command, args);
        self.state.sent.lock().push(line.clone());
        Ok(format!("{} {}", self.address, line))
    }

    fn batch(&self, force: bool, command: &[u8], args: &[&[u8]]) -> Result<(), MockError> {
        self.ensure_open()?;
        let full = {
            let mut pending = self.state.pending.lock();
            pending.push(Self::render(command, args));
            pending.len() >= self.pipeline_depth
        };
        if force || full {
            self.drain();
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), MockError> {
        self.ensure_open()?;
        self.state.flush_calls.fetch_add(1, Ordering::SeqCst);
        self.drain();
        Ok(())
    }

    fn close(&self) -> Result<(), MockError> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(MockError(format!("{} close failed", self.address)));
        }
        Ok(())
    }
}

/// Three masters splitting the slot space the way `redis-cli --cluster create` does
pub fn three_node_lines() -> Vec<String> {
    vec![
        "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-5460".to_string(),
        "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:7001@17001 master - 0 1426238316232 2 connected 5461-10922".to_string(),
        "292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:7002@17002 master - 0 1426238318243 3 connected 10923-16383".to_string(),
        "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:7003@17003 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected".to_string(),
    ]
}
