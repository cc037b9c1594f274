//! # Database service thread
//!
//! Drains `DatabaseRequest` arriving from two origins — ingress (`C1`) and
//! the Provisioner thread (`C7`) — and answers on the matching outbound
//! queue (`C2`/`C8` respectively), grounded on
//! `examples/original_source/core/database_types.go`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use etl_shared::messages::{DatabaseAction, DatabaseRequest, DatabaseResponse};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::database::DatabaseBackend;
use crate::services::drain::Drain;

pub struct DatabaseService {
    backend: Arc<dyn DatabaseBackend>,
    ingress_out: UnboundedSender<DatabaseResponse>,
    provisioner_out: UnboundedSender<DatabaseResponse>,
    accepting: AtomicBool,
    drain: Drain,
}

impl DatabaseService {
    #[must_use]
    pub fn new(
        backend: Arc<dyn DatabaseBackend>,
        ingress_out: UnboundedSender<DatabaseResponse>,
        provisioner_out: UnboundedSender<DatabaseResponse>,
    ) -> Self {
        Self {
            backend,
            ingress_out,
            provisioner_out,
            accepting: AtomicBool::new(false),
            drain: Drain::new(),
        }
    }

    pub fn setup(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    /// Concurrently drains both inbound queues until torn down.
    pub async fn start(
        self: Arc<Self>,
        ingress_in: UnboundedReceiver<DatabaseRequest>,
        provisioner_in: UnboundedReceiver<DatabaseRequest>,
    ) {
        let ingress = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run(ingress_in, Origin::Ingress))
        };
        let provisioner = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run(provisioner_in, Origin::Provisioner))
        };
        let _ = tokio::join!(ingress, provisioner);
    }

    async fn run(self: Arc<Self>, mut inbound: UnboundedReceiver<DatabaseRequest>, origin: Origin) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(request) = inbound.recv().await else {
                break;
            };
            self.drain.enter();
            let service = Arc::clone(&self);
            tokio::spawn(async move {
                service.handle(request, origin).await;
                service.drain.exit();
            });
        }
    }

    async fn handle(&self, request: DatabaseRequest, origin: Origin) {
        let response = match request.action {
            DatabaseAction::Store => {
                let outcome = self
                    .backend
                    .put(&request.data_type, &request.cluster, request.data.unwrap_or_default())
                    .await;
                Self::outcome_response(request.nonce, outcome.map(|_| None))
            }
            DatabaseAction::Fetch => {
                let outcome = self.backend.get(&request.data_type, &request.cluster).await;
                Self::outcome_response(request.nonce, outcome)
            }
            DatabaseAction::Replace => {
                let outcome = self
                    .backend
                    .replace(&request.data_type, &request.cluster, request.data.unwrap_or_default())
                    .await;
                DatabaseResponse {
                    nonce: request.nonce,
                    success: outcome.unwrap_or(false),
                    description: outcome.err().map(|e| e.to_string()),
                    data: None,
                }
            }
            DatabaseAction::Delete => {
                let outcome = self.backend.delete(&request.data_type, &request.cluster).await;
                DatabaseResponse {
                    nonce: request.nonce,
                    success: outcome.unwrap_or(false),
                    description: outcome.err().map(|e| e.to_string()),
                    data: None,
                }
            }
            DatabaseAction::UpperPing | DatabaseAction::LowerPing => DatabaseResponse {
                nonce: request.nonce,
                success: true,
                description: None,
                data: None,
            },
        };

        let outbound = match origin {
            Origin::Ingress => &self.ingress_out,
            Origin::Provisioner => &self.provisioner_out,
        };
        let _ = outbound.send(response);
    }

    fn outcome_response(
        nonce: u32,
        outcome: etl_shared::error::Result<Option<serde_json::Value>>,
    ) -> DatabaseResponse {
        match outcome {
            Ok(data) => DatabaseResponse {
                nonce,
                success: true,
                description: None,
                data,
            },
            Err(err) => DatabaseResponse {
                nonce,
                success: false,
                description: Some(err.to_string()),
                data: None,
            },
        }
    }

    pub async fn teardown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.drain.wait_for_zero().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Ingress,
    Provisioner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;
    use etl_shared::messages::DataType;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn store_then_fetch_round_trips_on_the_provisioner_path() {
        let backend = Arc::new(InMemoryDatabase::new());
        let (ingress_out, _ingress_rx) = mpsc::unbounded_channel();
        let (provisioner_out, mut provisioner_rx) = mpsc::unbounded_channel();
        let service = Arc::new(DatabaseService::new(backend, ingress_out, provisioner_out));
        service.setup();

        let (ingress_in_tx, ingress_in_rx) = mpsc::unbounded_channel();
        let (provisioner_in_tx, provisioner_in_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Arc::clone(&service).start(ingress_in_rx, provisioner_in_rx));

        provisioner_in_tx
            .send(DatabaseRequest {
                action: DatabaseAction::Store,
                nonce: 1,
                data_type: DataType::new("statistics"),
                cluster: "echo".to_string(),
                data: Some(serde_json::json!({"panicked": false})),
            })
            .unwrap();
        let stored = provisioner_rx.recv().await.unwrap();
        assert!(stored.success);

        provisioner_in_tx
            .send(DatabaseRequest {
                action: DatabaseAction::Fetch,
                nonce: 2,
                data_type: DataType::new("statistics"),
                cluster: "echo".to_string(),
                data: None,
            })
            .unwrap();
        let fetched = provisioner_rx.recv().await.unwrap();
        assert!(fetched.success);
        assert_eq!(fetched.data, Some(serde_json::json!({"panicked": false})));

        service.teardown().await;
        drop(ingress_in_tx);
        drop(provisioner_in_tx);
        let _ = handle.await;
    }
}
