//! # Domain Layer
//!
//! Core types and pure rules for group chain sync.

pub mod block;
pub mod entities;
pub mod errors;
pub mod fork_choice;

pub use block::{child_block, compute_block_hash, genesis_block, seal_block};
pub use entities::{
    BlockFetchMeta, Direction, EpochFetchMeta, SessionId, SyncMsg, SyncTask, SyncerStatus, TaskId,
    TaskMeta,
};
pub use errors::{BlockError, CodecError, InvalidReason, SyncError};
pub use fork_choice::{is_better_tip, recal_chain_height};
