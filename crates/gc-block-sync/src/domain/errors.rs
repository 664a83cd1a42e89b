//! # Domain Errors
//!
//! Error types for block ingestion, the sync protocol and envelope decoding.

use shared_crypto::CryptoError;
use shared_types::{BlockId, StorageError};
use thiserror::Error;

use super::entities::{SessionId, SyncerStatus};

/// Why a block failed validation against its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidReason {
    /// Block and parent belong to different groups.
    #[error("group id differs from parent")]
    GroupMismatch,
    /// `prev_block_id` does not name the parent.
    #[error("previous block id does not match parent")]
    PrevBlockIdMismatch,
    /// `prev_hash` does not equal the parent's hash.
    #[error("previous hash does not match parent")]
    PrevHashMismatch,
    /// Recomputed hash differs from the carried hash.
    #[error("block hash mismatch")]
    HashMismatch,
    /// Producer signature does not verify.
    #[error("bad producer signature")]
    BadSignature,
}

/// Block ingestion errors.
#[derive(Debug, Clone, Error)]
pub enum BlockError {
    /// Parent is not committed; the block stays quarantined.
    #[error("Parent block {parent_id} of {block_id} does not exist")]
    ParentNotExist {
        /// Quarantined block.
        block_id: BlockId,
        /// Missing parent.
        parent_id: BlockId,
    },

    /// Block failed validation and was removed from the cache.
    #[error("Invalid block {block_id}: {reason}")]
    InvalidBlock {
        /// Rejected block.
        block_id: BlockId,
        /// Failed check.
        reason: InvalidReason,
    },

    /// Block could not be encoded for hashing.
    #[error("Block encoding failed: {0}")]
    Encoding(String),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Envelope sealing/opening errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Signature or cipher failure.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Envelope was addressed to another group.
    #[error("Group mismatch: expected {expected}, got {got}")]
    GroupMismatch {
        /// Local group.
        expected: String,
        /// Envelope group.
        got: String,
    },

    /// Declared message type differs from the decoded payload.
    #[error("Message type mismatch")]
    TypeMismatch,
}

/// Sync session errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A session is already running.
    #[error("Sync already in progress: status {0}")]
    AlreadySyncing(SyncerStatus),

    /// No session is running.
    #[error("No sync session running")]
    NotSyncing,

    /// Response names a session this node did not start.
    #[error("Unknown sync session {got}")]
    UnknownSession {
        /// Session carried by the response.
        got: SessionId,
    },

    /// Block author is not in the producer pool.
    #[error("Untrusted producer {0}")]
    UntrustedProducer(String),

    /// Requested anchor block is not known locally.
    #[error("Block not found locally: {0}")]
    BlockNotFound(BlockId),

    /// Response is missing required content.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Ingestion failure.
    #[error(transparent)]
    Block(#[from] BlockError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Envelope failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
