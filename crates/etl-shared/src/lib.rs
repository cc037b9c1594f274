//! # etl-shared
//!
//! Shared error, config, and wire-message types for the ETL orchestration
//! core. Split out of `etl-core` the way `tasker-shared` is split out of
//! `tasker-orchestration`/`tasker-worker`: anything that needs to be visible
//! to both the engine and the (out-of-scope) ingress layer lives here.

pub mod config;
pub mod error;
pub mod logging;
pub mod messages;

pub use error::{EtlError, Result};
