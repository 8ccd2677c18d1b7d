//! Dispatch metrics
//!
//! Lock-free `(count, elapsed)` accumulators. Adds never block; a reset swaps the
//! totals out and returns them, serialized so two resets never split one total.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Immutable totals read from a [`Counter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub count: u64,
    pub elapsed_nanos: u64,
}

impl CounterSnapshot {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }

    /// Mean elapsed time per counted operation
    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_nanos(self.elapsed_nanos / self.count))
    }
}

/// Accumulating counter of operations and the time they took
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU64,
    elapsed_nanos: AtomicU64,
    reset_lock: Mutex<()>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` operations taking `elapsed` in total; zero amounts are ignored
    pub fn add(&self, count: u64, elapsed: Duration) {
        if count > 0 {
            self.count.fetch_add(count, Ordering::Relaxed);
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        if nanos > 0 {
            self.elapsed_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    /// Current totals without resetting
    pub fn totals(&self) -> CounterSnapshot {
        CounterSnapshot {
            count: self.count.load(Ordering::Relaxed),
            elapsed_nanos: self.elapsed_nanos.load(Ordering::Relaxed),
        }
    }

    /// Return the current totals and start again from zero
    pub fn reset(&self) -> CounterSnapshot {
        let _guard = self.reset_lock.lock();
        CounterSnapshot {
            count: self.count.swap(0, Ordering::Relaxed),
            elapsed_nanos: self.elapsed_nanos.swap(0, Ordering::Relaxed),
        }
    }
}

/// Counters fed by the routing dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub sends: Counter,
    pub batches: Counter,
    pub flushes: Counter,
}

/// Point-in-time view of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub sends: CounterSnapshot,
    pub batches: CounterSnapshot,
    pub flushes: CounterSnapshot,
}

impl DispatchMetrics {
    pub fn totals(&self) -> DispatchStats {
        DispatchStats {
            sends: self.sends.totals(),
            batches: self.batches.totals(),
            flushes: self.flushes.totals(),
        }
    }

    pub fn reset(&self) -> DispatchStats {
        DispatchStats {
            sends: self.sends.reset(),
            batches: self.batches.reset(),
            flushes: self.flushes.reset(),
        }
    }
}
