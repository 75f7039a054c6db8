//! Kernel counters.
//!
//! Lock-free counters updated on the resolution and release paths. A
//! [`MetricsSnapshot`] is a consistent-enough copy for dashboards and tests;
//! counters are read individually, not atomically as a group.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct KernelMetrics {
    resolutions: AtomicU64,
    instances_created: AtomicU64,
    instances_destroyed: AtomicU64,
    pool_hits: AtomicU64,
    pool_misses: AtomicU64,
    pool_discards: AtomicU64,
}

impl KernelMetrics {
    #[inline]
    pub(crate) fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_created(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_destroyed(&self) {
        self.instances_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Borrow served from an idle instance
    #[inline]
    pub(crate) fn record_pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Borrow that had to create a new instance
    #[inline]
    pub(crate) fn record_pool_miss(&self) {
        self.pool_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returned instance destroyed instead of re-queued
    #[inline]
    pub(crate) fn record_pool_discard(&self) {
        self.pool_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            instances_destroyed: self.instances_destroyed.load(Ordering::Relaxed),
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            pool_misses: self.pool_misses.load(Ordering::Relaxed),
            pool_discards: self.pool_discards.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the kernel counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Root `resolve` calls that returned an instance
    pub resolutions: u64,
    /// Instances built by component factories
    pub instances_created: u64,
    /// Instances decommissioned
    pub instances_destroyed: u64,
    /// Pooled borrows served from idle instances
    pub pool_hits: u64,
    /// Pooled borrows that created an instance
    pub pool_misses: u64,
    /// Pooled returns destroyed because the pool was full
    pub pool_discards: u64,
}

impl MetricsSnapshot {
    /// Instances created and not yet decommissioned.
    ///
    /// Includes instances that never needed teardown and were simply dropped.
    pub fn live_estimate(&self) -> u64 {
        self.instances_created.saturating_sub(self.instances_destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = KernelMetrics::default();
        metrics.record_resolution();
        metrics.record_created();
        metrics.record_created();
        metrics.record_destroyed();
        metrics.record_pool_hit();
        metrics.record_pool_miss();
        metrics.record_pool_discard();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.resolutions, 1);
        assert_eq!(snapshot.instances_created, 2);
        assert_eq!(snapshot.live_estimate(), 1);
        assert_eq!(snapshot.pool_hits, 1);
        assert_eq!(snapshot.pool_misses, 1);
        assert_eq!(snapshot.pool_discards, 1);
    }
}
