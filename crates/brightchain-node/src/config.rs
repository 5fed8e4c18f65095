//! Node configuration file management.
//!
//! Configuration loads from `$BRIGHTCHAIN_DATA_DIR/config.toml` (or the
//! platform default data directory), falling back to defaults when the
//! file is absent. Service sub-configurations validate through their own
//! crates.

use std::path::PathBuf;

use brightchain_crypto::random;
use brightchain_gossip::config::{GossipConfig, RetryConfig};
use serde::{Deserialize, Serialize};

/// Default store block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's gossip identity.
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// Fixed block size of the node's pool.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Gossip settings.
    #[serde(default)]
    pub gossip: GossipConfig,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_node_id() -> String {
    format!("node-{}", random::random_hex(8))
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            block_size: DEFAULT_BLOCK_SIZE,
            gossip: GossipConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Check that the identity, block size, and service configs are valid.
    pub fn validate(&self) -> bool {
        !self.node_id.is_empty()
            && self.block_size > 0
            && self.gossip.validate()
            && self.retry.validate()
    }

    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist configuration to the default config file location.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Platform data directory, overridable via `BRIGHTCHAIN_DATA_DIR`.
    pub fn data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("BRIGHTCHAIN_DATA_DIR") {
            return PathBuf::from(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".brightchain")
    }
}
