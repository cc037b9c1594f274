//! # Registry
//!
//! Tracks every [`Supervisor`] created for a single cluster and assigns
//! their ids (spec.md §4.3).
//!
//! Open Question (a) from spec.md §9 is resolved here: ids are `u64`,
//! allocated via `AtomicU64::fetch_add` and never wrapped — the original
//! implementation wrapped at `u32::MAX` without checking for collisions
//! with still-live ids, which spec.md flags as an open question. A 64-bit
//! monotonic counter makes wraparound a non-concern for any realistic
//! process lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::cluster::{ClusterImpl, Config};
use crate::helper::Helper;
use crate::supervisor::Supervisor;

/// Lifecycle status of a [`Registry`] itself (distinct from any one
/// supervisor's status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    UnMounted,
    Mounted,
    MarkedForDeletion,
}

/// Events that drive [`RegistryStatus`] (spec.md §4.3 transition table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    Mount,
    UnMount,
    Delete,
}

struct Inner {
    supervisors: HashMap<u64, Arc<Supervisor>>,
    status: RegistryStatus,
    mounted: bool,
}

/// Owns every supervisor ever created for one cluster identifier.
pub struct Registry {
    cluster_name: String,
    cluster_impl: Arc<dyn ClusterImpl>,
    id_counter: AtomicU64,
    inner: RwLock<Inner>,
}

impl Registry {
    #[must_use]
    pub fn new(cluster_name: impl Into<String>, cluster_impl: Arc<dyn ClusterImpl>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            cluster_impl,
            id_counter: AtomicU64::new(0),
            inner: RwLock::new(Inner {
                supervisors: HashMap::new(),
                status: RegistryStatus::UnMounted,
                mounted: false,
            }),
        }
    }

    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    #[must_use]
    pub fn cluster_implementation(&self) -> Arc<dyn ClusterImpl> {
        Arc::clone(&self.cluster_impl)
    }

    fn next_id(&self) -> u64 {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Creates a new supervisor for this cluster, assigns it an id, and
    /// retains it for the lifetime of the registry.
    pub fn create_supervisor(&self, config: Config, helper: Helper) -> Arc<Supervisor> {
        let id = self.next_id();
        let supervisor = Supervisor::new(self.cluster_implementation(), config, helper);
        supervisor.assign_id(id);

        let mut inner = self.inner.write().expect("registry mutex poisoned");
        inner.supervisors.insert(id, Arc::clone(&supervisor));
        supervisor
    }

    #[must_use]
    pub fn get_supervisor(&self, id: u64) -> Option<Arc<Supervisor>> {
        let inner = self.inner.read().expect("registry mutex poisoned");
        inner.supervisors.get(&id).cloned()
    }

    #[must_use]
    pub fn get_supervisors(&self) -> Vec<Arc<Supervisor>> {
        let inner = self.inner.read().expect("registry mutex poisoned");
        inner.supervisors.values().cloned().collect()
    }

    #[must_use]
    pub fn supervisor_exists(&self, id: u64) -> bool {
        let inner = self.inner.read().expect("registry mutex poisoned");
        inner.supervisors.contains_key(&id)
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.read().expect("registry mutex poisoned").mounted
    }

    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        self.inner.read().expect("registry mutex poisoned").status
    }

    /// Advances the registry's own status machine (spec.md §4.3).
    pub fn event(&self, event: RegistryEvent) -> bool {
        let mut inner = self.inner.write().expect("registry mutex poisoned");
        let (next, mounted) = match (inner.status, event) {
            (RegistryStatus::UnMounted, RegistryEvent::Mount) => (RegistryStatus::Mounted, true),
            (RegistryStatus::UnMounted, RegistryEvent::Delete) => {
                (RegistryStatus::MarkedForDeletion, false)
            }
            (RegistryStatus::Mounted, RegistryEvent::UnMount) => (RegistryStatus::UnMounted, false),
            (RegistryStatus::Mounted, RegistryEvent::Delete) => {
                (RegistryStatus::MarkedForDeletion, false)
            }
            _ => return false,
        };
        inner.status = next;
        inner.mounted = mounted;
        true
    }
}
