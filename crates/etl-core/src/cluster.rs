//! # Cluster contract
//!
//! The external, user-supplied Extract/Transform/Load triple (spec.md §3/§6).
//! The core never inspects a `Message`'s contents; it only moves them
//! between stages.

use crate::channel::{ChannelReceiver, ChannelSender};
use crate::helper::Helper;

/// An opaque payload carried between stages.
pub type Message = serde_json::Value;

pub type EtSender = ChannelSender<Message>;
pub type EtReceiver = ChannelReceiver<Message>;
pub type TlSender = ChannelSender<Message>;
pub type TlReceiver = ChannelReceiver<Message>;

/// Per-cluster configuration (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub identifier: String,
    pub start_with_n_transform_clusters: usize,
    pub start_with_n_load_clusters: usize,
    pub et_channel_threshold: usize,
    pub et_channel_growth_factor: usize,
    pub tl_channel_threshold: usize,
    pub tl_channel_growth_factor: usize,
}

impl Config {
    pub const DEFAULT_CHANNEL_THRESHOLD: usize = 10;
    pub const DEFAULT_CHANNEL_GROWTH_FACTOR: usize = 2;
    pub const DEFAULT_N_CLUSTERS: usize = 1;

    /// Mirrors the original implementation's `NewSupervisor` defaults.
    #[must_use]
    pub fn defaults(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            start_with_n_transform_clusters: Self::DEFAULT_N_CLUSTERS,
            start_with_n_load_clusters: Self::DEFAULT_N_CLUSTERS,
            et_channel_threshold: Self::DEFAULT_CHANNEL_THRESHOLD,
            et_channel_growth_factor: Self::DEFAULT_CHANNEL_GROWTH_FACTOR,
            tl_channel_threshold: Self::DEFAULT_CHANNEL_THRESHOLD,
            tl_channel_growth_factor: Self::DEFAULT_CHANNEL_GROWTH_FACTOR,
        }
    }
}

/// A named, user-supplied triple of Extract/Transform/Load functions.
///
/// Implementors are free to acquire a [`Helper`] for cache/log access from
/// whichever stage method they are handed it in.
pub trait ClusterImpl: Send + Sync {
    /// Produces messages into `out`. Must drop `out` (return) once the
    /// source is exhausted — that closes the ET channel and is how
    /// Transform workers learn extraction is complete.
    fn extract(&self, out: EtSender, helper: &Helper);

    /// Consumes `input` until it disconnects (the Extract worker finished),
    /// producing messages into `out`.
    fn transform(&self, input: EtReceiver, out: TlSender, helper: &Helper);

    /// Consumes `input` until it disconnects (every Transform worker
    /// finished, since `out`'s sender clones are all dropped at that point).
    fn load(&self, input: TlReceiver, helper: &Helper);
}
