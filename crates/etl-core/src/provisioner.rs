//! # Provisioner
//!
//! Registry of clusters known to this node; handles the
//! register/mount/unmount lifecycle (spec.md §4.4).
//!
//! Per spec.md §5, the four keyed collections live behind a single mutex so
//! that composite operations (e.g. `register` extending three maps at once)
//! are atomic with respect to every other Provisioner operation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;

use crate::cluster::{ClusterImpl, Config};
use crate::registry::Registry;

struct Inner {
    registered: HashMap<String, Arc<dyn ClusterImpl>>,
    operational: HashSet<String>,
    configs: HashMap<String, Config>,
    registries: HashMap<String, Arc<Registry>>,
}

/// Three keyed collections, all keyed by cluster identifier, guarded by one
/// mutex (spec.md §3 data model).
pub struct Provisioner {
    inner: Mutex<Inner>,
}

impl Provisioner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                registered: HashMap::new(),
                operational: HashSet::new(),
                configs: HashMap::new(),
                registries: HashMap::new(),
            }),
        }
    }

    /// Adds `name` to `Registered` and creates its `Registry`. Returns
    /// `false` if `name` is already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        cluster_impl: Arc<dyn ClusterImpl>,
        config: Option<Config>,
    ) -> bool {
        let name = name.into();
        let mut inner = self.inner.lock().expect("provisioner mutex poisoned");

        if inner.registered.contains_key(&name) {
            return false;
        }

        inner.registries.insert(
            name.clone(),
            Arc::new(Registry::new(name.clone(), Arc::clone(&cluster_impl))),
        );
        inner.registered.insert(name.clone(), cluster_impl);
        if let Some(config) = config {
            inner.configs.insert(name, config);
        }

        true
    }

    /// Promotes `name` from `Registered` to `Operational`. Returns `true`
    /// if it was already operational, `false` if `name` isn't registered.
    pub fn mount(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().expect("provisioner mutex poisoned");

        if inner.operational.contains(name) {
            return true;
        }
        if inner.registered.contains_key(name) {
            inner.operational.insert(name.to_string());
            if let Some(registry) = inner.registries.get(name) {
                registry.event(crate::registry::RegistryEvent::Mount);
            }
            true
        } else {
            false
        }
    }

    /// Removes `name` from `Operational`. Returns `false` if it wasn't
    /// operational. A supervisor mid-run when its cluster is unmounted is
    /// unaffected — it was created from `Function()`'s output independent
    /// of the `Operational` set (spec.md §9 Open Question (a), resolved).
    pub fn unmount(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().expect("provisioner mutex poisoned");
        if !inner.operational.remove(name) {
            return false;
        }
        if let Some(registry) = inner.registries.get(name) {
            registry.event(crate::registry::RegistryEvent::UnMount);
        }
        true
    }

    #[must_use]
    pub fn is_mounted(&self, name: &str) -> bool {
        self.inner
            .lock()
            .expect("provisioner mutex poisoned")
            .operational
            .contains(name)
    }

    /// Returns the triple needed to instantiate a supervisor; only
    /// succeeds for `Operational` names.
    #[must_use]
    pub fn function(
        &self,
        name: &str,
    ) -> Option<(Arc<dyn ClusterImpl>, Option<Config>, Arc<Registry>)> {
        let inner = self.inner.lock().expect("provisioner mutex poisoned");
        if !inner.operational.contains(name) {
            return None;
        }
        let cluster_impl = Arc::clone(inner.registered.get(name)?);
        let config = inner.configs.get(name).cloned();
        let registry = Arc::clone(inner.registries.get(name)?);
        Some((cluster_impl, config, registry))
    }

    #[must_use]
    pub fn registry_for(&self, name: &str) -> Option<Arc<Registry>> {
        self.inner
            .lock()
            .expect("provisioner mutex poisoned")
            .registries
            .get(name)
            .cloned()
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new()
    }
}
