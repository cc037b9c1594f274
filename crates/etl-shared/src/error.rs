//! # Error Types
//!
//! Unified error handling for the ETL orchestration core and its ambient
//! stack (config loading, cache, messaging, database abstraction).

use thiserror::Error;

/// Core result type used across `etl-shared` and `etl-core`.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Comprehensive error taxonomy for the orchestration core.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config file not found or unreadable: {path}")]
    ConfigNotFound { path: String },

    #[error("malformed config file {path}: {reason}")]
    ConfigMalformed { path: String, reason: String },

    #[error("cluster {0:?} is already registered")]
    ClusterAlreadyRegistered(String),

    #[error("cluster {0:?} is not registered")]
    ClusterNotRegistered(String),

    #[error("cluster {0:?} is not mounted")]
    ClusterNotMounted(String),

    #[error("supervisor {0} does not exist")]
    SupervisorNotFound(u64),

    #[error("cache entry {0} not found or expired")]
    CacheMiss(uuid::Uuid),

    #[error("timed out waiting for a response to nonce {0}")]
    ResponseTimeout(u32),

    #[error("response channel for nonce {0} was dropped before delivery")]
    ResponseDropped(u32),

    #[error("the service is no longer accepting requests")]
    NotAccepting,

    #[error("JSON (de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EtlError {
    /// True for faults that should never be treated as fatal to the node as
    /// a whole (request-rejection class, per spec.md §7).
    #[must_use]
    pub fn is_request_rejection(&self) -> bool {
        matches!(
            self,
            EtlError::ClusterAlreadyRegistered(_)
                | EtlError::ClusterNotRegistered(_)
                | EtlError::ClusterNotMounted(_)
                | EtlError::SupervisorNotFound(_)
                | EtlError::CacheMiss(_)
        )
    }
}
