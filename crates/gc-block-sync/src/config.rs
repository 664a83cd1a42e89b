//! # Block Sync Configuration
//!
//! Configuration for sync sessions and the task dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-task response timeout.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 4_000;

/// Timeout retries before a session is marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 30;

/// Depth of the inbound response queue.
pub const DEFAULT_MSG_QUEUE_DEPTH: usize = 3;

/// Blocks requested per task in the epoch-batched variant.
pub const DEFAULT_EPOCH_BATCH_SIZE: u64 = 10;

/// Prefix of the per-requester response channel.
pub const DEFAULT_SYNC_CHANNEL_PREFIX: &str = "sync_";

/// Which protocol generation a session speaks for forward sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncVariant {
    /// One block per request, walking parent/child links.
    #[default]
    SingleBlock,
    /// Ranges of canonical blocks by height.
    EpochBatch,
}

/// Sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time to wait for a response before resending the same task.
    pub task_timeout_ms: u64,

    /// Retries per task before giving up. `None` retries forever.
    pub max_retries: Option<u32>,

    /// Bounded depth of the response queue; overflow is dropped.
    pub msg_queue_depth: usize,

    /// Forward sync protocol.
    pub variant: SyncVariant,

    /// Blocks per epoch request.
    pub epoch_batch_size: u64,

    /// Prefix of response channel names.
    pub sync_channel_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            msg_queue_depth: DEFAULT_MSG_QUEUE_DEPTH,
            variant: SyncVariant::SingleBlock,
            epoch_batch_size: DEFAULT_EPOCH_BATCH_SIZE,
            sync_channel_prefix: DEFAULT_SYNC_CHANNEL_PREFIX.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (short timeouts, few retries).
    pub fn for_testing() -> Self {
        Self {
            task_timeout_ms: 200,
            max_retries: Some(3),
            msg_queue_depth: DEFAULT_MSG_QUEUE_DEPTH,
            variant: SyncVariant::SingleBlock,
            epoch_batch_size: 4,
            sync_channel_prefix: DEFAULT_SYNC_CHANNEL_PREFIX.to_string(),
        }
    }

    /// Task timeout as a `Duration`.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Settings for a session's task dispatcher.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            task_timeout: self.task_timeout(),
            max_retries: self.max_retries,
            msg_queue_depth: self.msg_queue_depth.max(1),
        }
    }
}

/// Task dispatcher settings.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Time to wait for `current_task_done` before resending.
    pub task_timeout: Duration,
    /// Timeout retries per task. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Bounded message queue depth.
    pub msg_queue_depth: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        SyncConfig::default().dispatcher_config()
    }
}
