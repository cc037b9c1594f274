//! # Provisioner service thread
//!
//! Drains `ProvisionerRequest` (`C5`) plus the `DatabaseResponse` (`C8`) and
//! `CacheResponse` (`C10`) reply queues, grounded on
//! `examples/original_source/core/provisioner_thread.go`. On `Provision` it
//! instantiates and runs a supervisor on a blocking thread, replying with
//! the new supervisor id on `C6` before the supervisor has even started —
//! the ordering spec.md §5 relies on — then emits a `Store` DatabaseRequest
//! and a `Close` MessengerRequest once the run finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use etl_shared::messages::{
    CacheResponse, DatabaseAction, DatabaseRequest, DatabaseResponse, DataType, MessengerRequest,
    ProvisionerAction, ProvisionerRequest, ProvisionerResponse,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::helper::HelperFactory;
use crate::provisioner::Provisioner;
use crate::response_table::ResponseTable;
use crate::services::drain::Drain;

pub struct ProvisionerService {
    provisioner: Arc<Provisioner>,
    helper_factory: HelperFactory,
    c6_tx: UnboundedSender<ProvisionerResponse>,
    c7_tx: UnboundedSender<DatabaseRequest>,
    c11_tx: UnboundedSender<MessengerRequest>,
    database_response_table: Arc<ResponseTable<DatabaseResponse>>,
    cache_response_table: Arc<ResponseTable<CacheResponse>>,
    accepting: AtomicBool,
    drain: Drain,
}

impl ProvisionerService {
    #[must_use]
    pub fn new(
        provisioner: Arc<Provisioner>,
        helper_factory: HelperFactory,
        c6_tx: UnboundedSender<ProvisionerResponse>,
        c7_tx: UnboundedSender<DatabaseRequest>,
        c11_tx: UnboundedSender<MessengerRequest>,
        database_response_table: Arc<ResponseTable<DatabaseResponse>>,
        cache_response_table: Arc<ResponseTable<CacheResponse>>,
    ) -> Self {
        Self {
            provisioner,
            helper_factory,
            c6_tx,
            c7_tx,
            c11_tx,
            database_response_table,
            cache_response_table,
            accepting: AtomicBool::new(false),
            drain: Drain::new(),
        }
    }

    pub fn setup(&self, auto_mount: &[String]) {
        self.accepting.store(true, Ordering::SeqCst);
        for cluster in auto_mount {
            if self.provisioner.mount(cluster) {
                info!(cluster = %cluster, "auto-mounted cluster from config");
            } else {
                warn!(cluster = %cluster, "auto-mount failed: cluster not registered");
            }
        }
    }

    pub async fn start(
        self: Arc<Self>,
        c5: UnboundedReceiver<ProvisionerRequest>,
        c8: UnboundedReceiver<DatabaseResponse>,
        c10: UnboundedReceiver<CacheResponse>,
    ) {
        let requests = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run_requests(c5))
        };
        let database_responses = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run_database_responses(c8))
        };
        let cache_responses = {
            let service = Arc::clone(&self);
            tokio::spawn(service.run_cache_responses(c10))
        };
        let _ = tokio::join!(requests, database_responses, cache_responses);
    }

    async fn run_requests(self: Arc<Self>, mut inbound: UnboundedReceiver<ProvisionerRequest>) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(request) = inbound.recv().await else {
                break;
            };
            self.drain.enter();
            match request.action {
                ProvisionerAction::Provision => {
                    // drain exit happens once the detached supervisor run completes
                    self.handle_provision(request);
                }
                _ => {
                    self.handle_immediate(request);
                    self.drain.exit();
                }
            }
        }
    }

    async fn run_database_responses(self: Arc<Self>, mut inbound: UnboundedReceiver<DatabaseResponse>) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(response) = inbound.recv().await else {
                break;
            };
            self.database_response_table.deliver(response.nonce, response);
        }
    }

    async fn run_cache_responses(self: Arc<Self>, mut inbound: UnboundedReceiver<CacheResponse>) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(response) = inbound.recv().await else {
                break;
            };
            self.cache_response_table.deliver(response.nonce, response);
        }
    }

    fn respond(
        &self,
        nonce: u32,
        cluster: &str,
        success: bool,
        description: Option<String>,
        supervisor_id: Option<u64>,
    ) {
        let _ = self.c6_tx.send(ProvisionerResponse {
            nonce,
            success,
            cluster: cluster.to_string(),
            description,
            supervisor_id,
        });
    }

    fn handle_immediate(&self, request: ProvisionerRequest) {
        match request.action {
            ProvisionerAction::Mount => {
                let ok = self.provisioner.mount(&request.cluster);
                self.respond(request.nonce, &request.cluster, ok, None, None);
            }
            ProvisionerAction::UnMount => {
                let ok = self.provisioner.unmount(&request.cluster);
                self.respond(request.nonce, &request.cluster, ok, None, None);
            }
            ProvisionerAction::Teardown => {
                self.accepting.store(false, Ordering::SeqCst);
                self.respond(request.nonce, &request.cluster, true, None, None);
            }
            ProvisionerAction::LowerPing => {
                self.respond(request.nonce, &request.cluster, true, None, None);
            }
            ProvisionerAction::DynamicLoad | ProvisionerAction::DynamicDelete => {
                self.respond(
                    request.nonce,
                    &request.cluster,
                    false,
                    Some("dynamic cluster loading is not supported".to_string()),
                    None,
                );
            }
            ProvisionerAction::Provision => unreachable!("handled in handle_provision"),
        }
    }

    fn handle_provision(self: &Arc<Self>, request: ProvisionerRequest) {
        if !self.provisioner.is_mounted(&request.cluster) {
            warn!(cluster = %request.cluster, "could not provision cluster; cluster was not mounted");
            self.respond(
                request.nonce,
                &request.cluster,
                false,
                Some("cluster is not mounted".to_string()),
                None,
            );
            self.drain.exit();
            return;
        }

        let Some((_cluster_impl, config, registry)) = self.provisioner.function(&request.cluster) else {
            warn!(cluster = %request.cluster, "corrupted cluster registration");
            self.respond(
                request.nonce,
                &request.cluster,
                false,
                Some("corrupted cluster registration".to_string()),
                None,
            );
            self.drain.exit();
            return;
        };

        let config = config.unwrap_or_else(|| crate::cluster::Config::defaults(&request.cluster));
        let helper = self.helper_factory.make(&request.cluster);
        let supervisor = registry.create_supervisor(config, helper);
        let supervisor_id = supervisor.id();
        info!(cluster = %request.cluster, supervisor_id, "provisioning cluster");

        self.respond(request.nonce, &request.cluster, true, None, Some(supervisor_id));

        let service = Arc::clone(self);
        let cluster_name = request.cluster.clone();
        tokio::spawn(async move {
            let run = tokio::task::spawn_blocking(move || supervisor.start());
            if let Ok(response) = run.await {
                let nonce = fastrand::u32(..);
                let data = serde_json::to_value(&response).ok();
                let _ = service.c7_tx.send(DatabaseRequest {
                    action: DatabaseAction::Store,
                    nonce,
                    data_type: DataType::new("statistics"),
                    cluster: cluster_name.clone(),
                    data,
                });
                let _ = service
                    .c11_tx
                    .send(MessengerRequest::close(cluster_name.clone()));
                info!(cluster = %cluster_name, panicked = response.panicked, "cluster run complete");
            }
            service.drain.exit();
        });
    }

    pub async fn teardown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.drain.wait_for_zero().await;
    }
}
