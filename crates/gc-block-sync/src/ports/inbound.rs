//! # Inbound Ports
//!
//! API the node exposes for one group chain.

use async_trait::async_trait;
use shared_types::{Block, ChainTip};

use crate::domain::{SyncError, SyncerStatus};
use crate::protocol::SyncEnvelope;

/// What happened to a broadcast block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Block (and any connected orphans) committed.
    Committed,
    /// Block was already committed.
    AlreadySaved,
    /// Parent unknown; block quarantined. `backward_started` reports whether
    /// a backward session was launched to fetch the ancestry.
    Quarantined {
        /// Whether a backward session started.
        backward_started: bool,
    },
}

/// Group chain sync API - inbound port.
#[async_trait]
pub trait BlockSyncApi: Send + Sync {
    /// Start forward sync from the current tip.
    async fn start_sync(&self) -> Result<(), SyncError>;

    /// Start backward sync from an orphan block.
    async fn start_backward(&self, block_id: &str) -> Result<(), SyncError>;

    /// Promote quarantined blocks whose parent is committed.
    async fn sync_local(&self) -> Result<usize, SyncError>;

    /// Stop the running session; the controller becomes `CLOSED`.
    async fn stop_sync(&self);

    /// Ingest a block announced by a producer.
    async fn handle_block_broadcast(&self, block: Block) -> Result<BroadcastOutcome, SyncError>;

    /// Handle an inbound sync envelope (request or response).
    async fn handle_sync_envelope(&self, envelope: SyncEnvelope) -> Result<(), SyncError>;

    /// Current sync status.
    fn syncer_status(&self) -> SyncerStatus;

    /// Current canonical tip.
    fn chain_tip(&self) -> ChainTip;
}
