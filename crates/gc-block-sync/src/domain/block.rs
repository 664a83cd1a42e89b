//! Block construction and hashing.

use shared_crypto::{sha256, Ed25519KeyPair};
use shared_types::{Block, GroupId, Hash, Trx};
use uuid::Uuid;

use super::errors::BlockError;

/// SHA-256 over the block encoding with `hash` and `signature` cleared.
pub fn compute_block_hash(block: &Block) -> Result<Hash, BlockError> {
    let bytes = block
        .hashing_bytes()
        .map_err(|e| BlockError::Encoding(e.to_string()))?;
    Ok(sha256(&bytes))
}

/// Stamp the producer key, hash and signature onto `block`.
pub fn seal_block(mut block: Block, keypair: &Ed25519KeyPair) -> Result<Block, BlockError> {
    block.producer_pubkey = *keypair.public_key().as_bytes();
    block.hash = compute_block_hash(&block)?;
    block.signature = keypair.sign(&block.hash).to_bytes();
    Ok(block)
}

/// Build the root block of a group.
pub fn genesis_block(
    group_id: &str,
    keypair: &Ed25519KeyPair,
    timestamp: i64,
) -> Result<Block, BlockError> {
    seal_block(
        Block {
            block_id: Uuid::new_v4().to_string(),
            group_id: GroupId::from(group_id),
            prev_block_id: String::new(),
            prev_hash: [0u8; 32],
            producer_pubkey: [0u8; 32],
            trxs: Vec::new(),
            timestamp,
            hash: [0u8; 32],
            signature: [0u8; 64],
        },
        keypair,
    )
}

/// Build a signed child of `parent`.
pub fn child_block(
    parent: &Block,
    trxs: Vec<Trx>,
    keypair: &Ed25519KeyPair,
    timestamp: i64,
) -> Result<Block, BlockError> {
    seal_block(
        Block {
            block_id: Uuid::new_v4().to_string(),
            group_id: parent.group_id.clone(),
            prev_block_id: parent.block_id.clone(),
            prev_hash: parent.hash,
            producer_pubkey: [0u8; 32],
            trxs,
            timestamp,
            hash: [0u8; 32],
            signature: [0u8; 64],
        },
        keypair,
    )
}
