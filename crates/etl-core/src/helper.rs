//! # Helper
//!
//! The facade handed to user `ClusterImpl` stage code so it can log and
//! stash/retrieve intermediate artifacts without knowing about the
//! underlying queues (spec.md §4.7).
//!
//! Per spec.md §9's "cyclic object graph" note, `Helper` never holds a
//! reference back to the whole core — only cloned channel senders and a
//! response-table handle, none of which outlive the core themselves.
//! Stage functions run on their own `std::thread`, so cache round trips
//! block that thread via `tokio::runtime::Handle::block_on` rather than
//! requiring stage code to be `async`.

use std::sync::Arc;
use std::time::Duration;

use etl_shared::error::Result;
use etl_shared::messages::{CacheAction, CacheRequest, CacheResponse, MessengerRequest};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::cluster::Message;
use crate::response_table::ResponseTable;

/// Default round-trip timeout for cache requests issued through a `Helper`.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Helper {
    cluster: String,
    cache_request_tx: UnboundedSender<CacheRequest>,
    cache_response_table: Arc<ResponseTable<CacheResponse>>,
    messenger_request_tx: UnboundedSender<MessengerRequest>,
    runtime: Handle,
    debug: bool,
}

impl Helper {
    #[must_use]
    pub fn new(
        cluster: impl Into<String>,
        cache_request_tx: UnboundedSender<CacheRequest>,
        cache_response_table: Arc<ResponseTable<CacheResponse>>,
        messenger_request_tx: UnboundedSender<MessengerRequest>,
        runtime: Handle,
        debug: bool,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            cache_request_tx,
            cache_response_table,
            messenger_request_tx,
            runtime,
            debug,
        }
    }

    /// Enqueues a `SaveIn` CacheRequest with the cache thread's default
    /// expiry (one hour) and blocks until the matching CacheResponse
    /// arrives, returning the generated identifier.
    pub fn save_to_cache(&self, data: Message) -> Result<Uuid> {
        self.save_to_cache_inner(data, None)
    }

    /// Same as [`Helper::save_to_cache`], but with an explicit expiry
    /// instead of the cache thread's default.
    pub fn save_to_cache_with_expiry(&self, data: Message, expires_in: Duration) -> Result<Uuid> {
        self.save_to_cache_inner(data, Some(expires_in))
    }

    fn save_to_cache_inner(&self, data: Message, expires_in: Option<Duration>) -> Result<Uuid> {
        let nonce = fastrand::u32(..);
        let slot = self.cache_response_table.create_listener(nonce);
        let _ = self.cache_request_tx.send(CacheRequest {
            action: CacheAction::SaveIn,
            nonce,
            identifier: None,
            data: Some(data),
            expires_in_secs: expires_in.map(|d| d.as_secs_f64()),
        });

        let table = Arc::clone(&self.cache_response_table);
        let reply = self
            .runtime
            .block_on(table.await_reply(slot, DEFAULT_HELPER_TIMEOUT))?;

        reply.identifier.ok_or_else(|| {
            etl_shared::error::EtlError::Internal("cache save response missing identifier".into())
        })
    }

    /// Enqueues a `LoadFrom` CacheRequest and blocks until the matching
    /// CacheResponse arrives.
    pub fn load_from_cache(&self, id: Uuid) -> Result<Message> {
        let nonce = fastrand::u32(..);
        let slot = self.cache_response_table.create_listener(nonce);
        let _ = self.cache_request_tx.send(CacheRequest {
            action: CacheAction::LoadFrom,
            nonce,
            identifier: Some(id),
            data: None,
            expires_in_secs: None,
        });

        let table = Arc::clone(&self.cache_response_table);
        let reply = self
            .runtime
            .block_on(table.await_reply(slot, DEFAULT_HELPER_TIMEOUT))?;

        if reply.success {
            reply
                .data
                .ok_or_else(|| etl_shared::error::EtlError::CacheMiss(id))
        } else {
            Err(etl_shared::error::EtlError::CacheMiss(id))
        }
    }

    /// Fire-and-forget log record.
    pub fn log(&self, message: impl Into<String>) {
        let _ = self
            .messenger_request_tx
            .send(MessengerRequest::log(self.cluster.clone(), message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let _ = self
            .messenger_request_tx
            .send(MessengerRequest::warning(self.cluster.clone(), message));
    }

    pub fn fatal(&self, message: impl Into<String>) {
        let _ = self
            .messenger_request_tx
            .send(MessengerRequest::fatal(self.cluster.clone(), message));
    }

    #[must_use]
    pub fn is_debug_enabled(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }
}

/// Builds a [`Helper`] scoped to a single cluster identifier, reusing the
/// shared queue senders and response table the Provisioner thread was
/// constructed with.
#[derive(Clone)]
pub struct HelperFactory {
    cache_request_tx: UnboundedSender<CacheRequest>,
    cache_response_table: Arc<ResponseTable<CacheResponse>>,
    messenger_request_tx: UnboundedSender<MessengerRequest>,
    runtime: Handle,
    debug: bool,
}

impl HelperFactory {
    #[must_use]
    pub fn new(
        cache_request_tx: UnboundedSender<CacheRequest>,
        cache_response_table: Arc<ResponseTable<CacheResponse>>,
        messenger_request_tx: UnboundedSender<MessengerRequest>,
        runtime: Handle,
        debug: bool,
    ) -> Self {
        Self {
            cache_request_tx,
            cache_response_table,
            messenger_request_tx,
            runtime,
            debug,
        }
    }

    #[must_use]
    pub fn make(&self, cluster: impl Into<String>) -> Helper {
        Helper::new(
            cluster,
            self.cache_request_tx.clone(),
            Arc::clone(&self.cache_response_table),
            self.messenger_request_tx.clone(),
            self.runtime.clone(),
            self.debug,
        )
    }
}
