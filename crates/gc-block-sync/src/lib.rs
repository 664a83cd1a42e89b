//! # Group Chain Block Sync
//!
//! Block synchronization and fork resolution for group chains.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every member of a group keeps a replica of the group's block tree.
//! This crate keeps that replica converged with the producers:
//! - Broadcast blocks are validated and committed, or quarantined until their
//!   parent arrives
//! - Forward sessions walk the chain from the local tip, one block per task
//!   (or one batch per task in the epoch variant)
//! - Backward sessions walk from an orphan down to a committed ancestor, then
//!   turn forward
//! - The canonical tip is the highest block; equal heights are broken by the
//!   greater hash
//!
//! ## Module Structure
//!
//! ```text
//! gc-block-sync/
//! ├── domain/          # Blocks, tasks, syncer status, fork choice, errors
//! ├── protocol/        # Wire messages and the signed SyncEnvelope
//! ├── algorithms/      # Block validation, chain walks
//! ├── ingest/          # BlockIngestor: quarantine, commit, tip selection
//! ├── dispatcher/      # Generic one-in-flight task dispatcher with retry
//! ├── ports/           # BlockSyncApi (inbound) + storage/network traits (outbound)
//! ├── adapters/        # In-memory stores, Ed25519 verifier, sealed envelopes, local network
//! ├── application/     # Session controller, responder, GroupChain
//! └── config.rs        # SyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod ingest;
pub mod ports;
pub mod protocol;

// Re-exports
pub use adapters::{
    pump, Delivery, Ed25519BlockVerifier, InMemoryBlockStore, InMemoryTrxStore, LocalEndpoint,
    LocalNetwork, SealedEnvelopeFactory,
};
pub use algorithms::{canonical_path, gather_connected, get_trimmed_blocks, validate_block};
pub use application::{GroupChain, GroupChainDeps, SyncResponder, SyncSessionController};
pub use config::{DispatcherConfig, SyncConfig, SyncVariant};
pub use dispatcher::{DispatcherHandle, DispatcherStatus, TaskDispatcher};
pub use domain::{
    child_block, genesis_block, is_better_tip, recal_chain_height, BlockError, CodecError,
    Direction, InvalidReason, SessionId, SyncError, SyncTask, SyncerStatus, TaskId, TaskMeta,
};
pub use ingest::{AddBlockOutcome, BlockIngestor};
pub use ports::{
    BlockStore, BlockSyncApi, BlockVerifier, BroadcastOutcome, Channel, ConnectionManager,
    EnvelopeFactory, RecordingConnection, TrxStore,
};
pub use protocol::{sync_channel_name, ResultCode, SyncEnvelope, SyncMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
