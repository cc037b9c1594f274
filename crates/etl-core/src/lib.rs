//! Core ETL orchestration primitives: the channel, cache, provisioner,
//! registry, supervisor, and service-thread types that make up a runnable
//! node (spec.md §2–§4).

pub mod cache;
pub mod channel;
pub mod cluster;
pub mod database;
pub mod helper;
pub mod orchestrator;
pub mod provisioner;
pub mod registry;
pub mod response_table;
pub mod services;
pub mod stats;
pub mod supervisor;
pub mod wait_group;

pub use cluster::{ClusterImpl, Config, EtReceiver, EtSender, Message, TlReceiver, TlSender};
pub use orchestrator::Orchestrator;
pub use provisioner::Provisioner;
pub use registry::Registry;
pub use supervisor::Supervisor;
