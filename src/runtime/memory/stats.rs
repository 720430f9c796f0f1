//! Collection statistics and heap metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Statistics from a garbage collection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcStats {
    /// 1-based collection number on this heap
    pub sequence: u64,
    /// Duration of the collection in milliseconds
    pub duration_ms: f64,
    /// Objects with a positive root counter when the collection started
    pub roots: usize,
    /// Objects registered when the collection started
    pub objects: usize,
    /// Objects reclaimed
    pub garbage: usize,
    /// Objects that survived
    pub survivors: usize,
    /// Bytes held by the reclaimed objects and their native resources
    pub bytes_freed: usize,
}

/// Running counters for one heap
#[derive(Debug, Default)]
pub struct HeapMetrics {
    registered: AtomicU64,
    reclaimed: AtomicU64,
    collections: AtomicU64,
    roots_added: AtomicU64,
    roots_removed: AtomicU64,
    history: RwLock<VecDeque<GcStats>>,
    last: RwLock<Option<GcStats>>,
}

impl HeapMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registration(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_root_added(&self) {
        self.roots_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_root_removed(&self) {
        self.roots_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Number assigned to the next collection
    pub fn next_sequence(&self) -> u64 {
        self.collections.load(Ordering::Relaxed) + 1
    }

    /// Record a finished collection, keeping at most `history_len` entries
    pub fn record_collection(&self, stats: &GcStats, history_len: usize) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.reclaimed
            .fetch_add(stats.garbage as u64, Ordering::Relaxed);
        *self.last.write() = Some(stats.clone());

        if history_len == 0 {
            return;
        }
        let mut history = self.history.write();
        while history.len() >= history_len {
            history.pop_front();
        }
        history.push_back(stats.clone());
    }

    /// Retained collection stats, oldest first
    pub fn history(&self) -> Vec<GcStats> {
        self.history.read().iter().cloned().collect()
    }

    pub fn last_collection(&self) -> Option<GcStats> {
        self.last.read().clone()
    }

    pub fn snapshot(&self, live_objects: usize) -> HeapMetricsSnapshot {
        HeapMetricsSnapshot {
            live_objects,
            objects_registered: self.registered.load(Ordering::Relaxed),
            objects_reclaimed: self.reclaimed.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
            roots_added: self.roots_added.load(Ordering::Relaxed),
            roots_removed: self.roots_removed.load(Ordering::Relaxed),
            last_collection: self.last_collection(),
        }
    }
}

/// Point-in-time view of a heap's metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapMetricsSnapshot {
    pub live_objects: usize,
    pub objects_registered: u64,
    pub objects_reclaimed: u64,
    pub collections: u64,
    pub roots_added: u64,
    pub roots_removed: u64,
    pub last_collection: Option<GcStats>,
}
