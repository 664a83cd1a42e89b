//! # Node Configuration
//!
//! Runtime parameters for the demo node. Defaults can be overridden from
//! `GC_*` environment variables.

use gc_block_sync::{SyncConfig, SyncVariant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Group served by both demo nodes.
    pub group_id: String,
    /// Name prefix used in logs.
    pub node_name: String,
    /// Blocks the producer creates before the follower joins.
    pub demo_blocks: u32,
    /// Sync engine configuration.
    pub sync: SyncConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            group_id: "demo-group".to_string(),
            node_name: "gc-node".to_string(),
            demo_blocks: 5,
            sync: SyncConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

impl NodeConfig {
    /// Apply overrides; `lookup` resolves a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(group_id) = lookup("GC_GROUP_ID") {
            self.group_id = group_id;
        }
        if let Some(value) = lookup("GC_TASK_TIMEOUT_MS") {
            self.sync.task_timeout_ms = parse("GC_TASK_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("GC_MAX_RETRIES") {
            // 0 disables the limit.
            let retries: u32 = parse("GC_MAX_RETRIES", value)?;
            self.sync.max_retries = (retries > 0).then_some(retries);
        }
        if let Some(value) = lookup("GC_SYNC_VARIANT") {
            self.sync.variant = match value.to_ascii_lowercase().as_str() {
                "single" | "single_block" => SyncVariant::SingleBlock,
                "epoch" | "epoch_batch" => SyncVariant::EpochBatch,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "GC_SYNC_VARIANT",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("GC_DEMO_BLOCKS") {
            self.demo_blocks = parse("GC_DEMO_BLOCKS", value)?;
        }
        Ok(())
    }

    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
