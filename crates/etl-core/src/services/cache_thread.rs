//! # Cache service thread
//!
//! Drains `CacheRequest` (`C9`) and answers on `CacheResponse` (`C10`);
//! runs a background janitor that evicts expired entries once a minute
//! (spec.md §4.6), grounded on
//! `examples/original_source/core/cache_thread.go`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use etl_shared::messages::{CacheAction, CacheRequest, CacheResponse};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::cache::Cache;
use crate::services::drain::Drain;

/// The original runs the janitor once a minute; kept as the default here.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(60);

pub struct CacheService {
    cache: Arc<Cache>,
    outbound: UnboundedSender<CacheResponse>,
    accepting: AtomicBool,
    drain: Drain,
    janitor_interval: Duration,
}

impl CacheService {
    #[must_use]
    pub fn new(cache: Arc<Cache>, outbound: UnboundedSender<CacheResponse>) -> Self {
        Self {
            cache,
            outbound,
            accepting: AtomicBool::new(false),
            drain: Drain::new(),
            janitor_interval: DEFAULT_JANITOR_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_janitor_interval(mut self, interval: Duration) -> Self {
        self.janitor_interval = interval;
        self
    }

    pub fn setup(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    /// Concurrently drains the request queue and runs the janitor loop
    /// until `teardown` flips `accepting` to false and the queue empties.
    pub async fn start(self: Arc<Self>, inbound: UnboundedReceiver<CacheRequest>) {
        let requests = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run_requests(inbound))
        };
        let janitor = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run_janitor())
        };
        let _ = tokio::join!(requests, janitor);
    }

    async fn run_requests(self: Arc<Self>, mut inbound: UnboundedReceiver<CacheRequest>) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(request) = inbound.recv().await else {
                break;
            };
            self.drain.enter();
            let service = Arc::clone(&self);
            tokio::spawn(async move {
                service.handle(request);
                service.drain.exit();
            });
        }
    }

    async fn run_janitor(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.janitor_interval);
        ticker.tick().await; // first tick fires immediately; skip it
        while self.accepting.load(Ordering::SeqCst) {
            ticker.tick().await;
            let evicted = self.cache.evict_expired();
            if evicted > 0 {
                debug!(evicted, "cache janitor evicted expired entries");
            }
        }
    }

    fn handle(&self, request: CacheRequest) {
        let response = match request.action {
            CacheAction::SaveIn => {
                let expires_in = Duration::from_secs_f64(
                    request.expires_in_secs.unwrap_or(3600.0).max(0.0),
                );
                let identifier = match request.identifier {
                    Some(id) if self.cache.get(id).is_some() => {
                        self.cache
                            .swap(id, request.data.unwrap_or(serde_json::Value::Null), expires_in);
                        id
                    }
                    _ => self
                        .cache
                        .save(request.data.unwrap_or(serde_json::Value::Null), expires_in),
                };
                CacheResponse {
                    nonce: request.nonce,
                    success: true,
                    identifier: Some(identifier),
                    data: None,
                }
            }
            CacheAction::LoadFrom => {
                let data = request.identifier.and_then(|id| self.cache.get(id));
                CacheResponse {
                    nonce: request.nonce,
                    success: data.is_some(),
                    identifier: request.identifier,
                    data,
                }
            }
            CacheAction::LowerPing => CacheResponse {
                nonce: request.nonce,
                success: true,
                identifier: None,
                data: None,
            },
        };
        let _ = self.outbound.send(response);
    }

    /// Stops accepting new requests and waits for in-flight ones to finish.
    pub async fn teardown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.drain.wait_for_zero().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn save_then_load_round_trips_through_the_queue() {
        let cache = Arc::new(Cache::new());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let service = Arc::new(CacheService::new(Arc::clone(&cache), out_tx));
        service.setup();

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Arc::clone(&service).start(in_rx));

        in_tx
            .send(CacheRequest {
                action: CacheAction::SaveIn,
                nonce: 1,
                identifier: None,
                data: Some(serde_json::json!("payload")),
                expires_in_secs: Some(60.0),
            })
            .unwrap();
        let saved = out_rx.recv().await.unwrap();
        assert!(saved.success);
        let id = saved.identifier.unwrap();

        in_tx
            .send(CacheRequest {
                action: CacheAction::LoadFrom,
                nonce: 2,
                identifier: Some(id),
                data: None,
                expires_in_secs: None,
            })
            .unwrap();
        let loaded = out_rx.recv().await.unwrap();
        assert!(loaded.success);
        assert_eq!(loaded.data, Some(serde_json::json!("payload")));

        service.teardown().await;
        drop(in_tx);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn load_of_unknown_identifier_reports_failure() {
        let cache = Arc::new(Cache::new());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let service = Arc::new(CacheService::new(Arc::clone(&cache), out_tx));
        service.setup();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Arc::clone(&service).start(in_rx));

        in_tx
            .send(CacheRequest {
                action: CacheAction::LoadFrom,
                nonce: 9,
                identifier: Some(uuid::Uuid::now_v7()),
                data: None,
                expires_in_secs: None,
            })
            .unwrap();
        let response = out_rx.recv().await.unwrap();
        assert!(!response.success);

        service.teardown().await;
        drop(in_tx);
        let _ = handle.await;
    }
}
