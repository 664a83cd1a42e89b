//! # Outbound Ports
//!
//! Traits for external dependencies: block storage, transaction storage,
//! signature verification, transport and envelope construction.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::CryptoError;
use shared_types::{Block, BlockId, ChainTip, GroupId, PublicKey, StorageError, Trx};

use crate::domain::{CodecError, SyncError};
use crate::protocol::{SyncEnvelope, SyncMessage};

/// Block storage - outbound port.
///
/// Every block lives either in the orphan cache (`cached = true`) or in
/// committed storage. Committed blocks carry a height of parent height + 1
/// and are indexed as sub-blocks of their parent.
pub trait BlockStore: Send + Sync {
    /// Whether the block exists in the chosen area.
    fn block_exists(&self, block_id: &str, cached: bool) -> Result<bool, StorageError>;

    /// Read a block from the chosen area.
    fn get_block(&self, block_id: &str, cached: bool) -> Result<Option<Block>, StorageError>;

    /// Write a block. Cached writes overwrite any previous cache entry.
    fn put_block(&self, block: &Block, cached: bool) -> Result<(), StorageError>;

    /// Remove a block from the chosen area. Missing blocks are not an error.
    fn remove_block(&self, block_id: &str, cached: bool) -> Result<(), StorageError>;

    /// Height of a committed block.
    fn get_height(&self, block_id: &str) -> Result<Option<u64>, StorageError>;

    /// Committed children of a committed block.
    fn get_sub_blocks(&self, block_id: &str) -> Result<Vec<Block>, StorageError>;

    /// Cached blocks whose parent is `block_id`.
    fn get_cached_children(&self, block_id: &str) -> Result<Vec<Block>, StorageError>;

    /// Every block currently in the orphan cache.
    fn get_cached_blocks(&self) -> Result<Vec<Block>, StorageError>;

    /// Persisted canonical tip of a group.
    fn get_chain_tip(&self, group_id: &str) -> Result<Option<ChainTip>, StorageError>;

    /// Persist the canonical tip of a group.
    fn save_chain_tip(&self, group_id: &str, tip: &ChainTip) -> Result<(), StorageError>;
}

/// Transaction storage - outbound port.
pub trait TrxStore: Send + Sync {
    /// Whether the transaction was already applied.
    fn is_applied(&self, trx_id: &str) -> Result<bool, StorageError>;

    /// Apply a transaction to application state.
    fn apply_trx(&self, trx: &Trx) -> Result<(), StorageError>;

    /// Persist the transaction record.
    fn save_trx(&self, trx: &Trx) -> Result<(), StorageError>;
}

/// Producer signature verification - outbound port.
pub trait BlockVerifier: Send + Sync {
    /// Verify `block.signature` over `block.hash` with `block.producer_pubkey`.
    fn verify_block_signature(&self, block: &Block) -> Result<(), CryptoError>;
}

/// Where an envelope is sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The group's producer channel; requests go here.
    Producer(GroupId),
    /// A named per-requester sync channel; responses go here.
    Sync(String),
}

/// Peer transport - outbound port.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Send an envelope on a channel.
    async fn send(&self, envelope: SyncEnvelope, channel: Channel) -> Result<(), SyncError>;

    /// Announce a freshly produced block to the group.
    async fn broadcast_block(&self, block: &Block) -> Result<(), SyncError>;
}

/// Envelope construction - outbound port.
pub trait EnvelopeFactory: Send + Sync {
    /// Public key envelopes are signed with.
    fn local_pubkey(&self) -> PublicKey;

    /// Encode, seal and sign a message.
    fn seal(&self, msg: &SyncMessage) -> Result<SyncEnvelope, CodecError>;

    /// Verify, unseal and decode an envelope.
    fn open(&self, envelope: &SyncEnvelope) -> Result<SyncMessage, CodecError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Connection that records everything sent through it.
#[derive(Default)]
pub struct RecordingConnection {
    /// Sent envelopes with their channels.
    pub sent: Mutex<Vec<(SyncEnvelope, Channel)>>,
    /// Broadcast block ids.
    pub broadcasts: Mutex<Vec<BlockId>>,
    /// Fail every send?
    pub should_fail: bool,
}

impl RecordingConnection {
    /// Connection that fails every send.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of envelopes sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ConnectionManager for RecordingConnection {
    async fn send(&self, envelope: SyncEnvelope, channel: Channel) -> Result<(), SyncError> {
        if self.should_fail {
            return Err(SyncError::Network("mock failure".to_string()));
        }
        self.sent.lock().push((envelope, channel));
        Ok(())
    }

    async fn broadcast_block(&self, block: &Block) -> Result<(), SyncError> {
        if self.should_fail {
            return Err(SyncError::Network("mock failure".to_string()));
        }
        self.broadcasts.lock().push(block.block_id.clone());
        Ok(())
    }
}
