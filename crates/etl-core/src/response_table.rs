//! # ResponseTable
//!
//! Nonce → single-shot delivery slot coordinator used to correlate
//! asynchronous replies crossing thread boundaries (spec.md §4.5).

use std::time::Duration;

use dashmap::DashMap;
use etl_shared::error::{EtlError, Result};
use tokio::sync::oneshot;

/// A single-shot listener registered for a nonce, awaiting delivery.
pub struct ResponseSlot<R> {
    nonce: u32,
    receiver: oneshot::Receiver<R>,
}

/// Nonce-keyed table of in-flight single-shot reply slots.
///
/// Each nonce is expected to be random (spec.md: "birthday-bound acceptable
/// for expected loads"); delivery to an unregistered nonce is silently
/// discarded, matching the original's behavior of sending on a closed /
/// absent channel being a no-op from the caller's perspective.
pub struct ResponseTable<R> {
    slots: DashMap<u32, oneshot::Sender<R>>,
}

impl<R> ResponseTable<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Registers a new listener for `nonce`. Callers must ensure `nonce` is
    /// not already outstanding within this table.
    pub fn create_listener(&self, nonce: u32) -> ResponseSlot<R> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(nonce, tx);
        ResponseSlot { nonce, receiver: rx }
    }

    /// Delivers `reply` to the listener registered for `nonce`, if any.
    /// Returns `true` if a listener was found and the reply was handed off.
    pub fn deliver(&self, nonce: u32, reply: R) -> bool {
        match self.slots.remove(&nonce) {
            Some((_, sender)) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Awaits delivery on `slot`, bounded by `timeout`. Cleans up the slot
    /// entry on timeout so it cannot be delivered to later.
    pub async fn await_reply(&self, slot: ResponseSlot<R>, timeout: Duration) -> Result<R> {
        match tokio::time::timeout(timeout, slot.receiver).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.slots.remove(&slot.nonce);
                Err(EtlError::ResponseDropped(slot.nonce))
            }
            Err(_) => {
                self.slots.remove(&slot.nonce);
                Err(EtlError::ResponseTimeout(slot.nonce))
            }
        }
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.slots.len()
    }
}

impl<R> Default for ResponseTable<R> {
    fn default() -> Self {
        Self::new()
    }
}
