//! Atomic proxy statistics counters.
//!
//! Monotonic display counters; `Relaxed` ordering throughout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Default)]
struct StatsInner {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
}

/// Thread-safe proxy statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct ProxyStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current stats values, serializable to JSON.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub failed_requests: u64,
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request the proxy could not complete (bad input or upstream failure).
    pub fn inc_failures(&self) {
        self.inner.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            failed_requests: self.inner.failed_requests.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let stats = ProxyStats::new();
        let clone = stats.clone();

        stats.inc_requests();
        clone.inc_requests();
        clone.inc_failures();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                total_requests: 2,
                failed_requests: 1,
            }
        );
        assert_eq!(
            serde_json::to_value(stats.snapshot()).unwrap(),
            serde_json::json!({ "total_requests": 2, "failed_requests": 1 })
        );
    }
}
