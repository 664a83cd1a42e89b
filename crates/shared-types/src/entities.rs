//! # Core Domain Entities
//!
//! Defines the group chain entities exchanged between nodes and persisted by
//! block storage.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `Trx`, `ChainTip`
//! - **Trust**: `ProducerItem`, `ProducerPool`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Block identifier (UUID string).
pub type BlockId = String;

/// Group identifier.
pub type GroupId = String;

/// A transaction carried inside a block.
///
/// The payload is opaque to the chain; only the id matters for
/// de-duplication when blocks are re-applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trx {
    /// Unique transaction id.
    pub trx_id: String,
    /// Group the transaction belongs to.
    pub group_id: GroupId,
    /// Public key of the submitting node.
    pub sender_pubkey: PublicKey,
    /// Opaque application payload.
    pub data: Vec<u8>,
    /// Creation time (unix nanoseconds).
    pub timestamp: i64,
}

/// A block in a group chain.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Unique block id.
    pub block_id: BlockId,
    /// Group this block belongs to.
    pub group_id: GroupId,
    /// Id of the parent block. Empty for the genesis block.
    pub prev_block_id: BlockId,
    /// Hash of the parent block. Zero for the genesis block.
    pub prev_hash: Hash,
    /// Public key of the producer that created the block.
    pub producer_pubkey: PublicKey,
    /// Transactions included in the block.
    pub trxs: Vec<Trx>,
    /// Creation time (unix nanoseconds).
    pub timestamp: i64,
    /// SHA-256 over the block with `hash` and `signature` cleared.
    pub hash: Hash,
    /// Producer signature over `hash`.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl Block {
    /// Whether this block has no parent.
    pub fn is_genesis(&self) -> bool {
        self.prev_block_id.is_empty()
    }

    /// Canonical bytes the block hash is computed over.
    ///
    /// Serializes a copy of the block with `hash` and `signature` zeroed.
    pub fn hashing_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut unsigned = self.clone();
        unsigned.hash = [0u8; 32];
        unsigned.signature = [0u8; 64];
        bincode::serialize(&unsigned)
    }
}

/// The canonical head of a group chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    /// Height of the tip block (genesis is 0).
    pub height: u64,
    /// Id of the tip block.
    pub block_id: BlockId,
    /// Hash of the tip block.
    pub hash: Hash,
}

impl ChainTip {
    /// Tip record for a block at the given height.
    pub fn of(block: &Block, height: u64) -> Self {
        Self {
            height,
            block_id: block.block_id.clone(),
            hash: block.hash,
        }
    }
}

// =============================================================================
// CLUSTER B: TRUST
// =============================================================================

/// A node authorized to produce blocks for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerItem {
    /// Group the producer is registered in.
    pub group_id: GroupId,
    /// Producer public key.
    pub producer_pubkey: PublicKey,
    /// Public key of the group owner that registered the producer.
    pub owner_pubkey: PublicKey,
    /// Registration time (unix nanoseconds).
    pub timestamp: i64,
    /// Free-form note.
    pub memo: String,
}

/// Set of trusted producers for a group, keyed by public key.
#[derive(Debug, Clone, Default)]
pub struct ProducerPool {
    producers: HashMap<PublicKey, ProducerItem>,
}

impl ProducerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a producer.
    pub fn insert(&mut self, item: ProducerItem) {
        self.producers.insert(item.producer_pubkey, item);
    }

    /// Remove a producer. Returns the removed entry if it existed.
    pub fn remove(&mut self, pubkey: &PublicKey) -> Option<ProducerItem> {
        self.producers.remove(pubkey)
    }

    /// Whether `pubkey` may produce blocks.
    pub fn is_producer(&self, pubkey: &PublicKey) -> bool {
        self.producers.contains_key(pubkey)
    }

    /// Look up a producer entry.
    pub fn get(&self, pubkey: &PublicKey) -> Option<&ProducerItem> {
        self.producers.get(pubkey)
    }

    /// Number of registered producers.
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
