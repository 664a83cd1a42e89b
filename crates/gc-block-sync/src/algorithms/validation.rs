//! Block validation against its parent.

use shared_types::Block;

use crate::domain::{compute_block_hash, InvalidReason};
use crate::ports::BlockVerifier;

/// Validate `block` as a child of `parent`.
///
/// Checks run cheapest first: group, parent id, parent hash, recomputed
/// hash, then the producer signature.
pub fn validate_block(
    block: &Block,
    parent: &Block,
    verifier: &dyn BlockVerifier,
) -> Result<(), InvalidReason> {
    if block.group_id != parent.group_id {
        return Err(InvalidReason::GroupMismatch);
    }
    if block.prev_block_id != parent.block_id {
        return Err(InvalidReason::PrevBlockIdMismatch);
    }
    if block.prev_hash != parent.hash {
        return Err(InvalidReason::PrevHashMismatch);
    }
    match compute_block_hash(block) {
        Ok(hash) if hash == block.hash => {}
        _ => return Err(InvalidReason::HashMismatch),
    }
    verifier
        .verify_block_signature(block)
        .map_err(|_| InvalidReason::BadSignature)
}
