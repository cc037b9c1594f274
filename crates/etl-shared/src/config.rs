//! # Node Configuration
//!
//! Loads the node-level config document described in spec.md §6. Parsing
//! the on-disk format is explicitly out of scope for the orchestration core
//! (spec.md §1), but a runnable node still needs *a* typed config surface —
//! this mirrors `tasker-shared`'s `ConfigManager` pattern of "load once at
//! startup, share via `Arc`".

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

/// Network binding section of the config document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Cache section of the config document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Seconds; 0 means "use the built-in default".
    #[serde(default)]
    pub expiry: f64,
}

impl CacheConfig {
    pub const DEFAULT_EXPIRY_SECS: f64 = 3600.0;

    #[must_use]
    pub fn expiry_seconds(&self) -> f64 {
        if self.expiry <= 0.0 {
            Self::DEFAULT_EXPIRY_SECS
        } else {
            self.expiry
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { expiry: 0.0 }
    }
}

/// The node's full configuration document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: f64,
    #[serde(default)]
    pub net: NetConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, rename = "auto-mount")]
    pub auto_mount: Vec<String>,
}

fn default_version() -> f64 {
    1.0
}

impl NodeConfig {
    /// Construct a minimal default config for a named node (mirrors the
    /// original implementation's `NewConfig(name)` constructor).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            net: NetConfig::default(),
            cache: CacheConfig::default(),
            debug: false,
            auto_mount: Vec::new(),
        }
    }

    /// Load a config document from a JSON or YAML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| EtlError::ConfigMalformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        settings
            .try_deserialize()
            .map_err(|e| EtlError::ConfigMalformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}
