//! # Chain Walks
//!
//! Traversals over committed storage and the orphan cache.

use std::collections::HashSet;

use shared_types::{Block, BlockId, ChainTip, StorageError};
use tracing::warn;

use super::validation::validate_block;
use crate::domain::BlockError;
use crate::ports::{BlockStore, BlockVerifier};

/// Committed block ids from `tip` back to the root, tip first.
pub fn canonical_path(store: &dyn BlockStore, tip: &ChainTip) -> Result<Vec<BlockId>, StorageError> {
    let mut path = Vec::with_capacity(tip.height as usize + 1);
    let mut cursor = tip.block_id.clone();
    loop {
        let block = store
            .get_block(&cursor, false)?
            .ok_or_else(|| StorageError::NotFound(cursor.clone()))?;
        path.push(block.block_id.clone());
        if block.is_genesis() {
            return Ok(path);
        }
        cursor = block.prev_block_id;
    }
}

/// Committed blocks reachable from `roots` that are not on `longest_path`.
///
/// Depth-first over sub-blocks; every id is visited once.
pub fn get_trimmed_blocks(
    store: &dyn BlockStore,
    roots: &[BlockId],
    longest_path: &HashSet<BlockId>,
) -> Result<Vec<BlockId>, StorageError> {
    let mut visited: HashSet<BlockId> = HashSet::new();
    let mut stack: Vec<BlockId> = roots.iter().rev().cloned().collect();
    let mut trimmed = Vec::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if !longest_path.contains(&id) {
            trimmed.push(id.clone());
        }
        for sub in store.get_sub_blocks(&id)?.into_iter().rev() {
            if !visited.contains(&sub.block_id) {
                stack.push(sub.block_id);
            }
        }
    }
    Ok(trimmed)
}

/// `root` followed by every cached descendant connected to it, parents
/// before children.
///
/// Each descendant is validated against its parent; invalid ones are removed
/// from the cache and their subtrees stay quarantined.
pub fn gather_connected(
    store: &dyn BlockStore,
    verifier: &dyn BlockVerifier,
    root: &Block,
) -> Result<Vec<Block>, BlockError> {
    let mut gathered = vec![root.clone()];
    let mut visited: HashSet<BlockId> = HashSet::from([root.block_id.clone()]);
    let mut stack = vec![root.clone()];

    while let Some(parent) = stack.pop() {
        for child in store.get_cached_children(&parent.block_id)? {
            if !visited.insert(child.block_id.clone()) {
                continue;
            }
            if let Err(reason) = validate_block(&child, &parent, verifier) {
                warn!(block_id = %child.block_id, %reason, "Dropping invalid cached block");
                store.remove_block(&child.block_id, true)?;
                continue;
            }
            gathered.push(child.clone());
            stack.push(child);
        }
    }
    Ok(gathered)
}
