//! # Drain
//!
//! An async-friendly in-flight counter used by service threads' `Teardown`
//! (spec.md §4.6: "blocks until in-flight work completes"). Unlike
//! [`crate::wait_group::WaitGroup`], which blocks a native thread via
//! `Condvar` and is used by the Supervisor's worker pool, `Drain` parks on a
//! `tokio::sync::Notify` so `Teardown` can be an ordinary `async fn`.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Drain {
    count: AtomicUsize,
    notify: Notify,
}

impl Drain {
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Marks one unit of work as started.
    pub fn enter(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks one unit of work as finished, waking any pending `wait_for_zero`.
    pub fn exit(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once the count reaches zero. Registers for notification
    /// before checking the count so a concurrent `exit()` can't be missed.
    pub async fn wait_for_zero(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
