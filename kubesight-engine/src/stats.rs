//! Per-kind synchronization status and counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::kind::ResourceKind;

/// Lifecycle state of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum KindStatus {
    /// The first list has not completed yet.
    Starting,
    /// Listed at least once and watching.
    Running,
    /// The first list keeps failing and is being retried; the kind
    /// publishes nothing until it succeeds.
    Failed(String),
}

impl KindStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, KindStatus::Running)
    }

    /// Whether the first list has not been attempted to completion yet.
    pub fn is_starting(&self) -> bool {
        matches!(self, KindStatus::Starting)
    }
}

/// Counters updated by a kind's watcher.
#[derive(Debug, Default)]
pub struct SyncStats {
    events_applied: AtomicU64,
    generation_errors: AtomicU64,
    resyncs: AtomicU64,
    watch_restarts: AtomicU64,
    list_failures: AtomicU64,
}

impl SyncStats {
    pub fn record_event(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation_errors(&self, count: usize) {
        self.generation_errors
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watch_restart(&self) {
        self.watch_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_list_failure(&self) {
        self.list_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self, objects: usize) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            generation_errors: self.generation_errors.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            watch_restarts: self.watch_restarts.load(Ordering::Relaxed),
            list_failures: self.list_failures.load(Ordering::Relaxed),
            objects,
        }
    }
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatsSnapshot {
    pub events_applied: u64,
    pub generation_errors: u64,
    pub resyncs: u64,
    pub watch_restarts: u64,
    pub list_failures: u64,
    /// Objects currently in the store.
    pub objects: usize,
}

/// Status of one kind as reported by [`Engine::status`](crate::Engine::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub status: KindStatus,
    pub stats: SyncStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = SyncStats::default();
        stats.record_event();
        stats.record_event();
        stats.record_generation_errors(3);
        stats.record_resync();
        stats.record_watch_restart();
        stats.record_list_failure();

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.events_applied, 2);
        assert_eq!(snapshot.generation_errors, 3);
        assert_eq!(snapshot.resyncs, 1);
        assert_eq!(snapshot.watch_restarts, 1);
        assert_eq!(snapshot.list_failures, 1);
        assert_eq!(snapshot.objects, 7);
    }

    #[test]
    fn test_status_serialization() {
        let failed = serde_json::to_value(KindStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(failed["state"], "failed");
        assert_eq!(failed["reason"], "boom");
        assert!(KindStatus::Running.is_running());

        let starting = serde_json::to_value(KindStatus::Starting).unwrap();
        assert_eq!(starting["state"], "starting");
        assert!(KindStatus::Starting.is_starting());
        assert!(!KindStatus::Failed("boom".to_string()).is_starting());
    }
}
