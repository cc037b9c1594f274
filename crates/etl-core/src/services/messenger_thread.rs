//! # Messenger service thread
//!
//! Drains `MessengerRequest` and emits structured log records via
//! `tracing`; a `Fatal` severity additionally raises `Interrupt(Fatal)`
//! (spec.md §4.6/§9's "Persisted state: ... the messenger's append-only log
//! sink" is satisfied by the process's own `tracing-subscriber` writer,
//! configured once in `etl-server`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use etl_shared::messages::{InterruptEvent, MessengerRequest, Severity};
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::services::drain::Drain;

pub struct MessengerService {
    interrupt_tx: broadcast::Sender<InterruptEvent>,
    accepting: AtomicBool,
    drain: Drain,
}

impl MessengerService {
    #[must_use]
    pub fn new(interrupt_tx: broadcast::Sender<InterruptEvent>) -> Self {
        Self {
            interrupt_tx,
            accepting: AtomicBool::new(false),
            drain: Drain::new(),
        }
    }

    pub fn setup(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    pub async fn start(self: Arc<Self>, mut inbound: UnboundedReceiver<MessengerRequest>) {
        while self.accepting.load(Ordering::SeqCst) {
            let Some(request) = inbound.recv().await else {
                break;
            };
            self.drain.enter();
            self.handle(request);
            self.drain.exit();
        }
    }

    fn handle(&self, request: MessengerRequest) {
        match request.severity {
            Severity::Log => info!(cluster = %request.cluster, message = %request.message, "log"),
            Severity::Warning => warn!(cluster = %request.cluster, message = %request.message, "warning"),
            Severity::Fatal => {
                error!(cluster = %request.cluster, message = %request.message, "fatal");
                let _ = self.interrupt_tx.send(InterruptEvent::Fatal);
            }
            Severity::Close => info!(cluster = %request.cluster, "cluster run complete"),
        }
    }

    pub async fn teardown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.drain.wait_for_zero().await;
    }
}
