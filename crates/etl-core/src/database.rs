//! # Database abstraction
//!
//! The core treats the database as a get/put/replace/delete abstraction
//! over named clusters (spec.md §1); the persistent storage engine itself
//! is an external collaborator. `InMemoryDatabase` is the reference
//! implementation used by the Database service thread in tests and
//! single-node deployments that don't need durability.

use async_trait::async_trait;
use dashmap::DashMap;
use etl_shared::error::Result;
use etl_shared::messages::DataType;

use crate::cluster::Message;

/// Backend abstraction the Database thread dispatches onto.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    async fn put(&self, data_type: &DataType, cluster: &str, data: Message) -> Result<()>;
    async fn get(&self, data_type: &DataType, cluster: &str) -> Result<Option<Message>>;
    async fn replace(&self, data_type: &DataType, cluster: &str, data: Message) -> Result<bool>;
    async fn delete(&self, data_type: &DataType, cluster: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Key {
    data_type: String,
    cluster: String,
}

/// A `DashMap`-backed reference implementation with no persistence across
/// process restart, consistent with spec.md §1's non-goals.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    records: DashMap<Key, Message>,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    fn key(data_type: &DataType, cluster: &str) -> Key {
        Key {
            data_type: data_type.0.clone(),
            cluster: cluster.to_string(),
        }
    }
}

#[async_trait]
impl DatabaseBackend for InMemoryDatabase {
    async fn put(&self, data_type: &DataType, cluster: &str, data: Message) -> Result<()> {
        self.records.insert(Self::key(data_type, cluster), data);
        Ok(())
    }

    async fn get(&self, data_type: &DataType, cluster: &str) -> Result<Option<Message>> {
        Ok(self.records.get(&Self::key(data_type, cluster)).map(|e| e.value().clone()))
    }

    async fn replace(&self, data_type: &DataType, cluster: &str, data: Message) -> Result<bool> {
        let key = Self::key(data_type, cluster);
        let existed = self.records.contains_key(&key);
        self.records.insert(key, data);
        Ok(existed)
    }

    async fn delete(&self, data_type: &DataType, cluster: &str) -> Result<bool> {
        Ok(self.records.remove(&Self::key(data_type, cluster)).is_some())
    }
}
