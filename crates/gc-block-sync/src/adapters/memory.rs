//! In-memory block and transaction storage.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::{Block, BlockId, ChainTip, GroupId, StorageError, Trx};

use crate::ports::{BlockStore, TrxStore};

#[derive(Default)]
struct BlockTables {
    committed: HashMap<BlockId, (Block, u64)>,
    cached: HashMap<BlockId, Block>,
    sub_blocks: HashMap<BlockId, Vec<BlockId>>,
    tips: HashMap<GroupId, ChainTip>,
}

/// In-memory block store for single-process nodes and tests.
///
/// Committed writes compute the height from the parent and register the
/// block as a sub-block of its parent, so a committed block can never be
/// orphaned.
#[derive(Default)]
pub struct InMemoryBlockStore {
    tables: RwLock<BlockTables>,
}

impl InMemoryBlockStore {
    /// Empty store with no genesis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed blocks.
    pub fn committed_count(&self) -> usize {
        self.tables.read().committed.len()
    }

    /// Number of quarantined blocks.
    pub fn cached_count(&self) -> usize {
        self.tables.read().cached.len()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn block_exists(&self, block_id: &str, cached: bool) -> Result<bool, StorageError> {
        let tables = self.tables.read();
        Ok(if cached {
            tables.cached.contains_key(block_id)
        } else {
            tables.committed.contains_key(block_id)
        })
    }

    fn get_block(&self, block_id: &str, cached: bool) -> Result<Option<Block>, StorageError> {
        let tables = self.tables.read();
        Ok(if cached {
            tables.cached.get(block_id).cloned()
        } else {
            tables.committed.get(block_id).map(|(b, _)| b.clone())
        })
    }

    fn put_block(&self, block: &Block, cached: bool) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if cached {
            tables.cached.insert(block.block_id.clone(), block.clone());
            return Ok(());
        }

        let height = if block.is_genesis() {
            0
        } else {
            let (_, parent_height) = tables.committed.get(&block.prev_block_id).ok_or_else(|| {
                StorageError::ParentNotFound {
                    block_id: block.block_id.clone(),
                    parent_id: block.prev_block_id.clone(),
                }
            })?;
            parent_height + 1
        };

        let is_new = tables
            .committed
            .insert(block.block_id.clone(), (block.clone(), height))
            .is_none();
        if is_new && !block.is_genesis() {
            tables
                .sub_blocks
                .entry(block.prev_block_id.clone())
                .or_default()
                .push(block.block_id.clone());
        }
        Ok(())
    }

    fn remove_block(&self, block_id: &str, cached: bool) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if cached {
            tables.cached.remove(block_id);
            return Ok(());
        }

        if let Some((block, _)) = tables.committed.remove(block_id) {
            if let Some(siblings) = tables.sub_blocks.get_mut(&block.prev_block_id) {
                siblings.retain(|id| id != block_id);
            }
        }
        Ok(())
    }

    fn get_height(&self, block_id: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.tables.read().committed.get(block_id).map(|(_, h)| *h))
    }

    fn get_sub_blocks(&self, block_id: &str) -> Result<Vec<Block>, StorageError> {
        let tables = self.tables.read();
        let Some(ids) = tables.sub_blocks.get(block_id) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                tables
                    .committed
                    .get(id)
                    .map(|(b, _)| b.clone())
                    .ok_or_else(|| StorageError::NotFound(id.clone()))
            })
            .collect()
    }

    fn get_cached_children(&self, block_id: &str) -> Result<Vec<Block>, StorageError> {
        let tables = self.tables.read();
        let mut children: Vec<Block> = tables
            .cached
            .values()
            .filter(|b| b.prev_block_id == block_id)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.block_id.cmp(&b.block_id));
        Ok(children)
    }

    fn get_cached_blocks(&self) -> Result<Vec<Block>, StorageError> {
        Ok(self.tables.read().cached.values().cloned().collect())
    }

    fn get_chain_tip(&self, group_id: &str) -> Result<Option<ChainTip>, StorageError> {
        Ok(self.tables.read().tips.get(group_id).cloned())
    }

    fn save_chain_tip(&self, group_id: &str, tip: &ChainTip) -> Result<(), StorageError> {
        self.tables
            .write()
            .tips
            .insert(group_id.to_string(), tip.clone());
        Ok(())
    }
}

#[derive(Default)]
struct TrxTables {
    saved: HashMap<String, Trx>,
    applied: Vec<String>,
}

/// In-memory transaction store.
///
/// Keeps the application order so callers can check that a transaction is
/// applied exactly once.
#[derive(Default)]
pub struct InMemoryTrxStore {
    tables: RwLock<TrxTables>,
}

impl InMemoryTrxStore {
    /// Empty transaction store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction ids in the order they were applied.
    pub fn applied_log(&self) -> Vec<String> {
        self.tables.read().applied.clone()
    }

    /// Number of saved transaction records.
    pub fn saved_count(&self) -> usize {
        self.tables.read().saved.len()
    }
}

impl TrxStore for InMemoryTrxStore {
    fn is_applied(&self, trx_id: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().applied.iter().any(|id| id == trx_id))
    }

    fn apply_trx(&self, trx: &Trx) -> Result<(), StorageError> {
        self.tables.write().applied.push(trx.trx_id.clone());
        Ok(())
    }

    fn save_trx(&self, trx: &Trx) -> Result<(), StorageError> {
        self.tables
            .write()
            .saved
            .insert(trx.trx_id.clone(), trx.clone());
        Ok(())
    }
}
