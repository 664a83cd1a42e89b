//! # Sync Entities
//!
//! Tasks, results and session state shared by the dispatcher and the
//! sync controller.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::BlockId;
use uuid::Uuid;

/// Monotonic task serial, unique within a node.
pub type TaskId = u64;

/// Identifies one sync run; echoed by responders.
pub type SessionId = Uuid;

/// Walk direction of a block fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ask for children of the block.
    Next,
    /// Ask for the parent of the block.
    Previous,
}

/// Fetch one block relative to `block_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFetchMeta {
    /// Anchor block.
    pub block_id: BlockId,
    /// Which neighbour to fetch.
    pub direction: Direction,
}

/// Fetch up to `count` canonical blocks starting at `from_height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochFetchMeta {
    /// First height requested.
    pub from_height: u64,
    /// Batch size.
    pub count: u64,
}

/// Task payload understood by the sync controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskMeta {
    /// Single-block walk.
    Block(BlockFetchMeta),
    /// Height-range batch.
    Epoch(EpochFetchMeta),
}

/// A unit of work for the task dispatcher.
///
/// A retry keeps `id` and `meta` and only bumps `retry_count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncTask<M> {
    /// Task serial.
    pub id: TaskId,
    /// What to request.
    pub meta: M,
    /// Timeout retries performed so far.
    pub retry_count: u32,
}

impl<M: Clone> SyncTask<M> {
    /// Fresh task.
    pub fn new(id: TaskId, meta: M) -> Self {
        Self {
            id,
            meta,
            retry_count: 0,
        }
    }

    /// The same task, resubmitted after a timeout.
    pub fn retried(&self) -> Self {
        Self {
            id: self.id,
            meta: self.meta.clone(),
            retry_count: self.retry_count + 1,
        }
    }
}

/// An inbound response correlated to a task.
#[derive(Clone, Debug)]
pub struct SyncMsg<P> {
    /// Task this response claims to answer.
    pub task_id: TaskId,
    /// Decoded response.
    pub payload: P,
}

/// Sync state of a group. Exactly one value at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncerStatus {
    /// No session running.
    Idle,
    /// Walking children from a known block.
    SyncingForward,
    /// Walking parents of an orphan.
    SyncingBackward,
    /// Last session exhausted its retries.
    SyncFailed,
    /// Promoting quarantined blocks from the local cache.
    LocalSyncing,
    /// Controller stopped; no further sessions.
    Closed,
}

impl SyncerStatus {
    /// Whether a new session may start from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, SyncerStatus::Idle | SyncerStatus::SyncFailed)
    }

    /// Whether a remote session is in flight.
    pub fn is_syncing(&self) -> bool {
        matches!(
            self,
            SyncerStatus::SyncingForward | SyncerStatus::SyncingBackward
        )
    }
}

impl fmt::Display for SyncerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncerStatus::Idle => "IDLE",
            SyncerStatus::SyncingForward => "SYNCING_FORWARD",
            SyncerStatus::SyncingBackward => "SYNCING_BACKWARD",
            SyncerStatus::SyncFailed => "SYNC_FAILED",
            SyncerStatus::LocalSyncing => "LOCAL_SYNCING",
            SyncerStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}
