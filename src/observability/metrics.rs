//! Metrics registry for the validation pipeline
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::audit::AuditStats;

/// Operational counters of an engine.
///
/// Uses Relaxed ordering; counters are independent of each other.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Evaluations started (including configuration failures)
    evaluations: AtomicU64,
    /// Evaluations that passed every layer
    passed: AtomicU64,
    /// Evaluations rejected by a validator
    rejected: AtomicU64,
    /// Evaluations stopped by the deadline
    timed_out: AtomicU64,
    /// Evaluations refused because no hierarchy could be selected
    configuration_errors: AtomicU64,
    /// Layers executed across all evaluations
    layers_evaluated: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_evaluations(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_passed(&self) {
        self.passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_configuration_errors(&self) {
        self.configuration_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_layers_evaluated(&self, layers: u64) {
        self.layers_evaluated.fetch_add(layers, Ordering::Relaxed);
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Snapshot of the pipeline counters merged with audit counters
    pub fn snapshot(&self, audit: AuditStats) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            configuration_errors: self.configuration_errors.load(Ordering::Relaxed),
            layers_evaluated: self.layers_evaluated.load(Ordering::Relaxed),
            audit_enqueued: audit.enqueued,
            audit_dropped: audit.dropped,
            audit_persisted: audit.persisted,
            audit_sink_failures: audit.sink_failures,
            audit_queued: audit.queued as u64,
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub evaluations: u64,
    pub passed: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub configuration_errors: u64,
    pub layers_evaluated: u64,
    pub audit_enqueued: u64,
    pub audit_dropped: u64,
    pub audit_persisted: u64,
    pub audit_sink_failures: u64,
    pub audit_queued: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot(AuditStats::default());

        assert_eq!(snapshot.evaluations, 0);
        assert_eq!(snapshot.rejected, 0);
        assert_eq!(snapshot.audit_dropped, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_evaluations();
        registry.increment_evaluations();
        registry.increment_passed();
        registry.increment_rejected();
        registry.increment_timed_out();
        registry.increment_configuration_errors();
        registry.add_layers_evaluated(3);

        let snapshot = registry.snapshot(AuditStats {
            dropped: 4,
            ..AuditStats::default()
        });
        assert_eq!(snapshot.evaluations, 2);
        assert_eq!(snapshot.passed, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.timed_out, 1);
        assert_eq!(snapshot.configuration_errors, 1);
        assert_eq!(snapshot.layers_evaluated, 3);
        assert_eq!(snapshot.audit_dropped, 4);
    }

    #[test]
    fn test_snapshot_json() {
        let registry = MetricsRegistry::new();
        registry.increment_evaluations();

        let json = serde_json::to_value(registry.snapshot(AuditStats::default())).unwrap();
        assert_eq!(json["evaluations"], 1);
        assert_eq!(json["audit_persisted"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_evaluations();
                    reg.increment_passed();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot(AuditStats::default());
        assert_eq!(snapshot.evaluations, 1000);
        assert_eq!(snapshot.passed, 1000);
    }
}
