//! Bounded metrics ring for worker-pool telemetry. Exceeding a call's
//! latency budget is recorded here, never surfaced as a hard failure to
//! the caller — per-call budgets are advisory for the pool, not a
//! contract with the session protocol.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolMetricEntry {
    pub operation: String,
    pub duration_ms: u64,
    pub ok: bool,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Fixed-capacity ring buffer: pushing past capacity evicts the oldest
/// entry rather than growing unbounded.
pub struct MetricsRing {
    capacity: usize,
    entries: Mutex<VecDeque<PoolMetricEntry>>,
}

impl MetricsRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, entry: PoolMetricEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<PoolMetricEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: &str) -> PoolMetricEntry {
        PoolMetricEntry {
            operation: op.into(),
            duration_ms: 10,
            ok: true,
            recorded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let ring = MetricsRing::new(2);
        ring.record(entry("a"));
        ring.record(entry("b"));
        ring.record(entry("c"));
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].operation, "b");
        assert_eq!(snap[1].operation, "c");
    }
}
