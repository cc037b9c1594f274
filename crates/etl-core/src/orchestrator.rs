//! # Orchestrator
//!
//! Wires the four service threads together over the `C1`–`C11` queues
//! described in spec.md §4.6, owns the `Provisioner` and `Cache`
//! singletons, and drives the cooperative shutdown sequence on
//! `Interrupt(Shutdown)` (spec.md §5), grounded on
//! `examples/original_source/core/provisioner_thread.go`'s
//! `DefaultHardTerminateTime` constant.

use std::sync::Arc;
use std::time::Duration;

use etl_shared::config::NodeConfig;
use etl_shared::messages::{
    CacheRequest, CacheResponse, DatabaseRequest, DatabaseResponse, InterruptEvent,
    MessengerRequest, ProvisionerRequest, ProvisionerResponse,
};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::cache::Cache;
use crate::cluster::{ClusterImpl, Config};
use crate::database::DatabaseBackend;
use crate::helper::HelperFactory;
use crate::provisioner::Provisioner;
use crate::response_table::ResponseTable;
use crate::services::{CacheService, DatabaseService, MessengerService, ProvisionerService};

/// Outer bound on graceful shutdown before the process exits regardless of
/// in-flight supervisors (the original's `DefaultHardTerminateTime`).
pub const DEFAULT_HARD_TERMINATE: Duration = Duration::from_secs(30 * 60);

/// Owns every queue endpoint a caller (an ingress layer, or a test) needs to
/// drive the core from outside.
pub struct OrchestratorHandles {
    pub provisioner_requests: UnboundedSender<ProvisionerRequest>,
    pub database_requests: UnboundedSender<DatabaseRequest>,
    pub interrupts: broadcast::Sender<InterruptEvent>,
    /// `C6` itself has a single consumer; an out-of-scope ingress layer (or
    /// a test) takes it once via [`OrchestratorHandles::take_provisioner_responses`].
    provisioner_responses: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ProvisionerResponse>>>,
}

impl OrchestratorHandles {
    /// Takes ownership of the `C6` receiver. Panics if called more than
    /// once — there is only ever one consumer.
    pub fn take_provisioner_responses(&self) -> mpsc::UnboundedReceiver<ProvisionerResponse> {
        self.provisioner_responses
            .lock()
            .expect("provisioner_responses mutex poisoned")
            .take()
            .expect("provisioner responses already taken")
    }
}

pub struct Orchestrator {
    provisioner: Arc<Provisioner>,
    provisioner_service: Arc<ProvisionerService>,
    database_service: Arc<DatabaseService>,
    cache_service: Arc<CacheService>,
    messenger_service: Arc<MessengerService>,
    handles: OrchestratorHandles,
    hard_terminate: Duration,
    tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Orchestrator {
    /// Builds every queue, service, and the shared `Provisioner`/`Cache`
    /// singletons, but does not start draining anything yet — call
    /// [`Orchestrator::run`] for that.
    #[must_use]
    pub fn new(config: NodeConfig, database_backend: Arc<dyn DatabaseBackend>) -> Self {
        let provisioner = Arc::new(Provisioner::new());
        let cache = Arc::new(Cache::new());

        let (c1_tx, c1_rx) = mpsc::unbounded_channel::<DatabaseRequest>();
        let (c2_tx, _c2_rx) = mpsc::unbounded_channel::<DatabaseResponse>();
        let (c5_tx, c5_rx) = mpsc::unbounded_channel::<ProvisionerRequest>();
        let (c6_tx, c6_rx) = mpsc::unbounded_channel::<ProvisionerResponse>();
        let (c7_tx, c7_rx) = mpsc::unbounded_channel::<DatabaseRequest>();
        let (c8_tx, c8_rx) = mpsc::unbounded_channel::<DatabaseResponse>();
        let (c9_tx, c9_rx) = mpsc::unbounded_channel::<CacheRequest>();
        let (c10_tx, c10_rx) = mpsc::unbounded_channel::<CacheResponse>();
        let (c11_tx, c11_rx) = mpsc::unbounded_channel::<MessengerRequest>();
        let (interrupt_tx, _interrupt_rx) = broadcast::channel::<InterruptEvent>(32);

        let database_response_table = Arc::new(ResponseTable::<DatabaseResponse>::new());
        let cache_response_table = Arc::new(ResponseTable::<CacheResponse>::new());

        let helper_factory = HelperFactory::new(
            c9_tx.clone(),
            Arc::clone(&cache_response_table),
            c11_tx.clone(),
            tokio::runtime::Handle::current(),
            config.debug,
        );

        let provisioner_service = Arc::new(ProvisionerService::new(
            Arc::clone(&provisioner),
            helper_factory,
            c6_tx,
            c7_tx,
            c11_tx.clone(),
            Arc::clone(&database_response_table),
            Arc::clone(&cache_response_table),
        ));

        let database_service = Arc::new(DatabaseService::new(database_backend, c2_tx, c8_tx));
        let cache_service = Arc::new(CacheService::new(
            Arc::clone(&cache),
            c10_tx,
        ));
        let messenger_service = Arc::new(MessengerService::new(interrupt_tx.clone()));

        // keep the receivers alive until `run` moves them into each
        // service's `start`; stashed on self via interior fields below.
        let orchestrator = Self {
            provisioner,
            provisioner_service,
            database_service,
            cache_service,
            messenger_service,
            handles: OrchestratorHandles {
                provisioner_requests: c5_tx,
                database_requests: c1_tx,
                interrupts: interrupt_tx,
                provisioner_responses: std::sync::Mutex::new(Some(c6_rx)),
            },
            hard_terminate: DEFAULT_HARD_TERMINATE,
            tasks: std::sync::Mutex::new(Vec::new()),
        };

        orchestrator.spawn_all(
            config.auto_mount,
            c1_rx,
            c5_rx,
            c7_rx,
            c8_rx,
            c9_rx,
            c10_rx,
            c11_rx,
        );

        orchestrator
    }

    fn spawn_all(
        &self,
        auto_mount: Vec<String>,
        c1_rx: mpsc::UnboundedReceiver<DatabaseRequest>,
        c5_rx: mpsc::UnboundedReceiver<ProvisionerRequest>,
        c7_rx: mpsc::UnboundedReceiver<DatabaseRequest>,
        c8_rx: mpsc::UnboundedReceiver<DatabaseResponse>,
        c9_rx: mpsc::UnboundedReceiver<CacheRequest>,
        c10_rx: mpsc::UnboundedReceiver<CacheResponse>,
        c11_rx: mpsc::UnboundedReceiver<MessengerRequest>,
    ) {
        self.messenger_service.setup();
        self.database_service.setup();
        self.cache_service.setup();
        self.provisioner_service.setup(&auto_mount);

        let mut tasks = self.tasks.lock().expect("orchestrator task list poisoned");
        tasks.push(tokio::spawn(Arc::clone(&self.messenger_service).start(c11_rx)));
        tasks.push(tokio::spawn(Arc::clone(&self.database_service).start(c1_rx, c7_rx)));
        tasks.push(tokio::spawn(Arc::clone(&self.cache_service).start(c9_rx)));
        tasks.push(tokio::spawn(
            Arc::clone(&self.provisioner_service).start(c5_rx, c8_rx, c10_rx),
        ));
    }

    /// Registers a cluster implementation so it can later be `Mount`ed.
    pub fn register_cluster(
        &self,
        identifier: impl Into<String>,
        cluster_impl: Arc<dyn ClusterImpl>,
        config: Option<Config>,
    ) -> bool {
        self.provisioner.register(identifier, cluster_impl, config)
    }

    #[must_use]
    pub fn handles(&self) -> &OrchestratorHandles {
        &self.handles
    }

    /// Blocks until an `Interrupt` arrives, then runs the Teardown sequence
    /// in reverse dependency order, racing a hard-terminate watchdog.
    pub async fn run(&self) {
        let mut interrupts = self.handles.interrupts.subscribe();
        match interrupts.recv().await {
            Ok(InterruptEvent::Shutdown) => info!("shutdown requested"),
            Ok(InterruptEvent::Fatal) => warn!("fatal interrupt received; shutting down"),
            Err(_) => warn!("interrupt channel closed; shutting down"),
        }

        let graceful = self.teardown();
        tokio::select! {
            _ = graceful => info!("graceful shutdown complete"),
            _ = tokio::time::sleep(self.hard_terminate) => {
                warn!("hard-terminate watchdog elapsed; exiting without waiting further");
            }
        }
    }

    /// Tears down every service thread in reverse dependency order:
    /// Provisioner depends on Cache/Database/Messenger, so it goes first.
    async fn teardown(&self) {
        self.provisioner_service.teardown().await;
        self.cache_service.teardown().await;
        self.database_service.teardown().await;
        self.messenger_service.teardown().await;

        let drained: Vec<_> = self
            .tasks
            .lock()
            .expect("orchestrator task list poisoned")
            .drain(..)
            .collect();
        for task in drained {
            let _ = task.await;
        }
    }
}
