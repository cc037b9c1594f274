//! # Ingress Queue Contract Types
//!
//! Typed request/response payloads carried across the queues described in
//! spec.md §4.6/§6. These are the wire-shaped types the (out-of-scope) HTTP
//! ingress layer would construct; the core only ever consumes and produces
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 32-bit correlation id tying an async reply to its originating request.
pub type Nonce = u32;

/// Severity levels a `MessengerRequest` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Log,
    Warning,
    Fatal,
    Close,
}

/// A message sent to the Messenger thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerRequest {
    pub severity: Severity,
    pub cluster: String,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
}

impl MessengerRequest {
    #[must_use]
    pub fn log(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Log,
            cluster: cluster.into(),
            message: message.into(),
            emitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn warning(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            cluster: cluster.into(),
            message: message.into(),
            emitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn fatal(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            cluster: cluster.into(),
            message: message.into(),
            emitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn close(cluster: impl Into<String>) -> Self {
        Self {
            severity: Severity::Close,
            cluster: cluster.into(),
            message: String::new(),
            emitted_at: Utc::now(),
        }
    }
}

/// A `(Type, Cluster)` key for database records, per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType(pub String);

impl DataType {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }
}

/// Action tag for `DatabaseRequest` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseAction {
    Store,
    Fetch,
    Replace,
    Delete,
    UpperPing,
    LowerPing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseRequest {
    pub action: DatabaseAction,
    pub nonce: Nonce,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub cluster: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseResponse {
    pub nonce: Nonce,
    pub success: bool,
    pub description: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// Action tag for `CacheRequest` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheAction {
    SaveIn,
    LoadFrom,
    LowerPing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRequest {
    pub action: CacheAction,
    pub nonce: Nonce,
    pub identifier: Option<Uuid>,
    pub data: Option<serde_json::Value>,
    pub expires_in_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheResponse {
    pub nonce: Nonce,
    pub success: bool,
    pub identifier: Option<Uuid>,
    pub data: Option<serde_json::Value>,
}

/// Action tag for `ProvisionerRequest` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionerAction {
    Mount,
    UnMount,
    Provision,
    DynamicLoad,
    DynamicDelete,
    Teardown,
    LowerPing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerRequest {
    pub action: ProvisionerAction,
    pub nonce: Nonce,
    pub cluster: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerResponse {
    pub nonce: Nonce,
    pub success: bool,
    pub cluster: String,
    pub description: Option<String>,
    pub supervisor_id: Option<u64>,
}

/// Raised to request cooperative shutdown of the whole node (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptEvent {
    Shutdown,
    Fatal,
}
