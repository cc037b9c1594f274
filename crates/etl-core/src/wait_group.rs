//! # WaitGroup
//!
//! A reference-counted completion barrier used by a [`crate::supervisor::Supervisor`]
//! to know when every worker thread has returned, and by the runtime watcher
//! to know when to stop polling (spec.md §9, fixing the original
//! implementation's unbounded watcher goroutine).

use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    count: Mutex<usize>,
    condvar: Condvar,
}

/// Cloneable handle to a shared completion counter.
#[derive(Debug, Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    pub fn add(&self, n: usize) {
        let mut count = self.inner.count.lock().expect("wait group mutex poisoned");
        *count += n;
    }

    /// Decrement by one; wakes any waiters once the count reaches zero.
    pub fn done(&self) {
        let mut count = self.inner.count.lock().expect("wait group mutex poisoned");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.inner.condvar.notify_all();
        }
    }

    /// Blocks the calling thread until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.inner.count.lock().expect("wait group mutex poisoned");
        while *count > 0 {
            count = self
                .inner
                .condvar
                .wait(count)
                .expect("wait group condvar poisoned");
        }
    }

    /// Non-blocking snapshot of the current count, used by the runtime
    /// watcher to decide whether to keep polling.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.inner.count.lock().expect("wait group mutex poisoned")
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}
