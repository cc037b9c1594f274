//! Service threads (spec.md §4.6): long-lived tokio tasks that each drain
//! one or more typed inbound queues and reply on typed outbound queues.

pub mod cache_thread;
pub mod database_thread;
pub mod drain;
pub mod messenger_thread;
pub mod provisioner_thread;

pub use cache_thread::CacheService;
pub use database_thread::DatabaseService;
pub use drain::Drain;
pub use messenger_thread::MessengerService;
pub use provisioner_thread::ProvisionerService;
