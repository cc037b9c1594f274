//! # Statistics
//!
//! Per-supervisor counters (spec.md §3). Monotonic non-decreasing for the
//! lifetime of the owning supervisor; safe to read concurrently with the
//! runtime watcher and worker threads mutating it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking one supervisor's provisioning activity.
#[derive(Debug, Default)]
pub struct Statistics {
    pub num_provisioned_extract_routines: AtomicU64,
    pub num_provisioned_transform_routines: AtomicU64,
    pub num_provisioned_load_routines: AtomicU64,
    pub num_et_threshold_breaches: AtomicU64,
    pub num_tl_threshold_breaches: AtomicU64,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_extract(&self) -> u64 {
        self.num_provisioned_extract_routines.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn incr_transform(&self) -> u64 {
        self.num_provisioned_transform_routines.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn incr_load(&self) -> u64 {
        self.num_provisioned_load_routines.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn incr_et_breach(&self) -> u64 {
        self.num_et_threshold_breaches.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn incr_tl_breach(&self) -> u64 {
        self.num_tl_threshold_breaches.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Immutable snapshot suitable for embedding in a [`crate::supervisor::Response`].
    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            num_provisioned_extract_routines: self.num_provisioned_extract_routines.load(Ordering::SeqCst),
            num_provisioned_transform_routines: self.num_provisioned_transform_routines.load(Ordering::SeqCst),
            num_provisioned_load_routines: self.num_provisioned_load_routines.load(Ordering::SeqCst),
            num_et_threshold_breaches: self.num_et_threshold_breaches.load(Ordering::SeqCst),
            num_tl_threshold_breaches: self.num_tl_threshold_breaches.load(Ordering::SeqCst),
        }
    }
}

/// A point-in-time, `Serialize`-able copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatisticsSnapshot {
    pub num_provisioned_extract_routines: u64,
    pub num_provisioned_transform_routines: u64,
    pub num_provisioned_load_routines: u64,
    pub num_et_threshold_breaches: u64,
    pub num_tl_threshold_breaches: u64,
}
