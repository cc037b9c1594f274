//! # Logging
//!
//! One-shot `tracing-subscriber` initialization shared by every binary in
//! the workspace, mirroring the teacher's `logging::init_tracing()` entry
//! point. Honors `RUST_LOG`, defaulting to `info` when unset.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global `tracing` subscriber. Safe to call once per process;
/// a second call is a no-op (the underlying `set_global_default` error is
/// swallowed since tests may initialize more than once).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
