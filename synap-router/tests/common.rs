//! Common test utilities

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use synap_router::{Connector, NodeAddress, NodeHandle, RouterConfig, TOTAL_SLOTS};

/// Every command seen by any test node: `(address, generation, command line)`
pub type Journal = Arc<Mutex<Vec<(NodeAddress, u32, String)>>>;

#[derive(Debug, thiserror::Error)]
pub enum TestNodeError {
    #[error("node {0} is closed")]
    Closed(NodeAddress),
    #[error("MOVED {0} {1}")]
    Moved(u16, NodeAddress),
    #[error("close failed on {0}")]
    CloseFailed(NodeAddress),
}

/// Node handle that records commands into a shared journal
#[derive(Debug)]
pub struct TestNode {
    address: NodeAddress,
    generation: u32,
    journal: Journal,
    pending: Mutex<Vec<String>>,
    closed: AtomicBool,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
    /// Slot this node refuses with a MOVED reply
    moved: Option<(u16, NodeAddress)>,
}

impl TestNode {
    pub fn new(address: &NodeAddress, journal: Journal) -> Self {
        Self {
            address: address.clone(),
            generation: 0,
            journal,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
            moved: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    #[allow(dead_code)]
    pub fn with_moved(mut self, slot: u16, to: NodeAddress) -> Self {
        self.moved = Some((slot, to));
        self
    }

    #[allow(dead_code)]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[allow(dead_code)]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Close counter shared with this handle, readable after the handle is dropped
    #[allow(dead_code)]
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn line(command: &[u8], args: &[&[u8]]) -> String {
        let mut line = String::from_utf8_lossy(command).into_owned();
        for arg in args {
            line.push(' ');
            line.push_str(&String::from_utf8_lossy(arg));
        }
        line
    }

    fn check(&self, args: &[&[u8]]) -> Result<(), TestNodeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TestNodeError::Closed(self.address.clone()));
        }
        if let (Some((slot, to)), Some(key)) = (&self.moved, args.first()) {
            if synap_router::hash_slot(key) == *slot {
                return Err(TestNodeError::Moved(*slot, to.clone()));
            }
        }
        Ok(())
    }

    fn record(&self, line: String) {
        self.journal
            .lock()
            .push((self.address.clone(), self.generation, line));
    }
}

impl NodeHandle for TestNode {
    type Reply = String;
    type Error = TestNodeError;

    fn connect(address: &NodeAddress, _config: &RouterConfig) -> Result<Self, TestNodeError> {
        Ok(Self::new(address, Journal::default()))
    }

    fn reopen(&self) -> Result<Self, TestNodeError> {
        Ok(Self {
            generation: self.generation + 1,
            ..Self::new(&self.address, Arc::clone(&self.journal))
        })
    }

    fn address(&self) -> &NodeAddress {
        &self.address
    }

    fn send(&self, command: &[u8], args: &[&[u8]]) -> Result<String, TestNodeError> {
        self.check(args)?;
        self.record(Self::line(command, args));
        Ok("OK".to_string())
    }

    fn batch(&self, force: bool, command: &[u8], args: &[&[u8]]) -> Result<(), TestNodeError> {
        self.check(args)?;
        self.pending.lock().push(Self::line(command, args));
        if force {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), TestNodeError> {
        let drained: Vec<String> = self.pending.lock().drain(..).collect();
        for line in drained {
            self.record(line);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), TestNodeError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(TestNodeError::CloseFailed(self.address.clone()));
        }
        Ok(())
    }
}

/// Connector that shares `journal` between all nodes it opens
#[allow(dead_code)]
pub fn journal_connector(journal: &Journal) -> Connector<TestNode> {
    let journal = Arc::clone(journal);
    Box::new(move |address, _config| Ok(TestNode::new(address, Arc::clone(&journal))))
}

/// Node lines for `node_count` masters on consecutive ports
///
/// Slots are split the way `redis-cli --cluster create` does it: each node's last
/// slot is the rounded running share, so 3 nodes own 0-5460, 5461-10922, 10923-16383.
#[allow(dead_code)]
pub fn cluster_lines(node_count: u16) -> Vec<String> {
    let share = f64::from(TOTAL_SLOTS) / f64::from(node_count);
    let mut cursor = 0.0;
    let mut start = 0u16;
    (0..node_count)
        .map(|i| {
            let end = if i == node_count - 1 {
                TOTAL_SLOTS - 1
            } else {
                ((cursor + share - 1.0).round() as u16).min(TOTAL_SLOTS - 1)
            };
            let line = format!(
                "node-{i} 127.0.0.1:{}@{} master - 0 0 {} connected {}-{}",
                7000 + i,
                17000 + i,
                i + 1,
                start,
                end
            );
            start = end + 1;
            cursor += share;
            line
        })
        .collect()
}

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
