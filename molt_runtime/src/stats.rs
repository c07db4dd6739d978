//! Runtime statistics.
//!
//! Relaxed atomic counters; no reader path synchronizes through these.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Counters for redefinition and migration activity.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    /// Successful redefinitions (table activations past serial 0).
    redefinitions: AtomicU64,
    /// Candidates rejected by validation.
    rejected_redefinitions: AtomicU64,
    /// Instances allocated.
    instances_allocated: AtomicU64,
    /// Field reads answered with a synthesized default (field added after
    /// the instance's allocation, never written).
    synthesized_reads: AtomicU64,
    /// Fields lazily materialized in overflow storage on first write.
    lazy_materializations: AtomicU64,
}

impl RuntimeStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful redefinition.
    #[inline]
    pub fn record_redefinition(&self) {
        self.redefinitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected candidate.
    #[inline]
    pub fn record_rejection(&self) {
        self.rejected_redefinitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an instance allocation.
    #[inline]
    pub fn record_allocation(&self) {
        self.instances_allocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a synthesized-default field read.
    #[inline]
    pub fn record_synthesized_read(&self) {
        self.synthesized_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lazy field materialization.
    #[inline]
    pub fn record_lazy_materialization(&self) {
        self.lazy_materializations.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            redefinitions: self.redefinitions.load(Ordering::Relaxed),
            rejected_redefinitions: self.rejected_redefinitions.load(Ordering::Relaxed),
            instances_allocated: self.instances_allocated.load(Ordering::Relaxed),
            synthesized_reads: self.synthesized_reads.load(Ordering::Relaxed),
            lazy_materializations: self.lazy_materializations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful redefinitions.
    pub redefinitions: u64,
    /// Rejected candidates.
    pub rejected_redefinitions: u64,
    /// Instances allocated.
    pub instances_allocated: u64,
    /// Synthesized-default reads.
    pub synthesized_reads: u64,
    /// Lazy materializations.
    pub lazy_materializations: u64,
}

// =============================================================================
// Global Stats
// =============================================================================

/// Global stats singleton.
static GLOBAL_STATS: OnceLock<RuntimeStats> = OnceLock::new();

/// Get the global runtime stats.
#[inline]
pub fn global_stats() -> &'static RuntimeStats {
    GLOBAL_STATS.get_or_init(RuntimeStats::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = RuntimeStats::new();
        stats.record_redefinition();
        stats.record_redefinition();
        stats.record_rejection();
        stats.record_synthesized_read();

        let snap = stats.snapshot();
        assert_eq!(snap.redefinitions, 2);
        assert_eq!(snap.rejected_redefinitions, 1);
        assert_eq!(snap.synthesized_reads, 1);
        assert_eq!(snap.lazy_materializations, 0);
    }

    #[test]
    fn test_global_singleton() {
        assert!(std::ptr::eq(global_stats(), global_stats()));
    }
}
