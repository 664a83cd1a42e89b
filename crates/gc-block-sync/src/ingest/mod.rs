//! # Block Ingestor
//!
//! The only writer of committed blocks and the orphan cache for a group.
//!
//! `add_block` runs the whole read-validate-write sequence under one lock:
//!
//! ```text
//! committed? ──yes──→ AlreadySaved
//!     │no
//! cache block
//!     │
//! parent committed? ──no──→ ParentNotExist (stays quarantined)
//!     │yes
//! validate ──bad──→ evict from cache, InvalidBlock
//!     │ok
//! gather cached descendants (parent first)
//!     │
//! apply trxs → commit in order → recompute tip → persist tip
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_crypto::short_hex;
use shared_types::{Block, BlockId, ChainTip, GroupId, StorageError};
use tracing::{debug, info, warn};

use crate::algorithms::{canonical_path, gather_connected, get_trimmed_blocks, validate_block};
use crate::domain::{recal_chain_height, BlockError};
use crate::ports::{BlockStore, BlockVerifier, TrxStore};

/// Result of a successful `add_block`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddBlockOutcome {
    /// The block was already committed; nothing changed.
    AlreadySaved,
    /// The block and its connected orphans were committed.
    Committed {
        /// Committed ids, parents first.
        committed: Vec<BlockId>,
        /// Canonical tip after the commit.
        tip: ChainTip,
        /// Committed blocks left off the canonical path by a tip switch.
        trimmed: Vec<BlockId>,
    },
}

/// Validates, quarantines and commits blocks for one group.
pub struct BlockIngestor {
    group_id: GroupId,
    store: Arc<dyn BlockStore>,
    trxs: Arc<dyn TrxStore>,
    verifier: Arc<dyn BlockVerifier>,
    tip: Mutex<ChainTip>,
}

impl BlockIngestor {
    /// Open the ingestor, committing `genesis` if the group has no tip yet.
    pub fn open(
        group_id: impl Into<GroupId>,
        genesis: &Block,
        store: Arc<dyn BlockStore>,
        trxs: Arc<dyn TrxStore>,
        verifier: Arc<dyn BlockVerifier>,
    ) -> Result<Self, BlockError> {
        let group_id = group_id.into();
        let tip = match store.get_chain_tip(&group_id)? {
            Some(tip) => tip,
            None => {
                if !store.block_exists(&genesis.block_id, false)? {
                    store.put_block(genesis, false)?;
                }
                let tip = ChainTip::of(genesis, 0);
                store.save_chain_tip(&group_id, &tip)?;
                info!(group_id = %group_id, block_id = %genesis.block_id, "Initialized group chain at genesis");
                tip
            }
        };

        Ok(Self {
            group_id,
            store,
            trxs,
            verifier,
            tip: Mutex::new(tip),
        })
    }

    /// Group this ingestor serves.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Current canonical tip.
    pub fn tip(&self) -> ChainTip {
        self.tip.lock().clone()
    }

    /// Ingest a block.
    pub fn add_block(&self, block: Block) -> Result<AddBlockOutcome, BlockError> {
        let mut tip = self.tip.lock();
        let block_id = block.block_id.clone();

        if self.store.block_exists(&block_id, false)? {
            debug!(block_id = %block_id, "Block already saved");
            return Ok(AddBlockOutcome::AlreadySaved);
        }

        self.store.put_block(&block, true)?;

        let Some(parent) = self.store.get_block(&block.prev_block_id, false)? else {
            debug!(block_id = %block_id, parent_id = %block.prev_block_id, "Parent missing, block quarantined");
            return Err(BlockError::ParentNotExist {
                block_id,
                parent_id: block.prev_block_id,
            });
        };

        if let Err(reason) = validate_block(&block, &parent, self.verifier.as_ref()) {
            warn!(block_id = %block_id, %reason, "Rejected invalid block");
            self.store.remove_block(&block_id, true)?;
            return Err(BlockError::InvalidBlock { block_id, reason });
        }

        let gathered = gather_connected(self.store.as_ref(), self.verifier.as_ref(), &block)?;

        for b in &gathered {
            self.apply_trxs(b)?;
        }

        let mut candidates = Vec::with_capacity(gathered.len());
        for b in &gathered {
            self.store.put_block(b, false)?;
            self.store.remove_block(&b.block_id, true)?;
            let height = self
                .store
                .get_height(&b.block_id)?
                .ok_or_else(|| StorageError::NotFound(b.block_id.clone()))?;
            candidates.push(ChainTip::of(b, height));
        }

        let new_tip = recal_chain_height(&tip, &candidates);
        let trimmed = if new_tip != *tip {
            self.store.save_chain_tip(&self.group_id, &new_tip)?;
            let trimmed = self.trimmed_after_switch(&tip, &new_tip)?;
            info!(
                group_id = %self.group_id,
                height = new_tip.height,
                block_id = %new_tip.block_id,
                hash = %short_hex(&new_tip.hash),
                trimmed = trimmed.len(),
                "Chain tip advanced"
            );
            *tip = new_tip.clone();
            trimmed
        } else {
            Vec::new()
        };

        Ok(AddBlockOutcome::Committed {
            committed: gathered.into_iter().map(|b| b.block_id).collect(),
            tip: new_tip,
            trimmed,
        })
    }

    /// Re-run `add_block` for every quarantined block whose parent is
    /// committed. Returns the number of blocks committed.
    pub fn promote_cached(&self) -> Result<usize, BlockError> {
        let mut promoted = 0;
        loop {
            let ready: Vec<Block> = self
                .store
                .get_cached_blocks()?
                .into_iter()
                .filter(|b| {
                    matches!(self.store.block_exists(&b.prev_block_id, false), Ok(true))
                })
                .collect();
            if ready.is_empty() {
                return Ok(promoted);
            }

            let mut progressed = false;
            for block in ready {
                // An earlier iteration may already have committed it as a descendant.
                if !self.store.block_exists(&block.block_id, true)? {
                    continue;
                }
                match self.add_block(block) {
                    Ok(AddBlockOutcome::Committed { committed, .. }) => {
                        promoted += committed.len();
                        progressed = true;
                    }
                    Ok(AddBlockOutcome::AlreadySaved) => {}
                    Err(BlockError::InvalidBlock { .. }) => progressed = true,
                    Err(e) => return Err(e),
                }
            }
            if !progressed {
                return Ok(promoted);
            }
        }
    }

    fn apply_trxs(&self, block: &Block) -> Result<(), BlockError> {
        for trx in &block.trxs {
            if self.trxs.is_applied(&trx.trx_id)? {
                debug!(trx_id = %trx.trx_id, "Trx already applied, saving only");
            } else {
                self.trxs.apply_trx(trx)?;
            }
            self.trxs.save_trx(trx)?;
        }
        Ok(())
    }

    /// Side-branch blocks when the tip moved off the old canonical path.
    fn trimmed_after_switch(
        &self,
        old_tip: &ChainTip,
        new_tip: &ChainTip,
    ) -> Result<Vec<BlockId>, BlockError> {
        let path = canonical_path(self.store.as_ref(), new_tip)?;
        if path.contains(&old_tip.block_id) {
            return Ok(Vec::new());
        }

        let root = path.last().cloned().unwrap_or_default();
        let on_path: HashSet<BlockId> = path.into_iter().collect();
        let trimmed = get_trimmed_blocks(self.store.as_ref(), &[root], &on_path)?;
        warn!(
            group_id = %self.group_id,
            old_tip = %old_tip.block_id,
            new_tip = %new_tip.block_id,
            trimmed = trimmed.len(),
            "Canonical chain switched branch"
        );
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Ed25519BlockVerifier, InMemoryBlockStore, InMemoryTrxStore};
    use crate::domain::{child_block, genesis_block, InvalidReason};
    use shared_crypto::Ed25519KeyPair;
    use shared_types::Trx;

    struct Fixture {
        kp: Ed25519KeyPair,
        genesis: Block,
        store: Arc<InMemoryBlockStore>,
        trxs: Arc<InMemoryTrxStore>,
        ingestor: BlockIngestor,
    }

    fn fixture() -> Fixture {
        let kp = Ed25519KeyPair::from_seed([11u8; 32]);
        let genesis = genesis_block("g", &kp, 0).unwrap();
        let store = Arc::new(InMemoryBlockStore::new());
        let trxs = Arc::new(InMemoryTrxStore::new());
        let ingestor = BlockIngestor::open(
            "g",
            &genesis,
            store.clone(),
            trxs.clone(),
            Arc::new(Ed25519BlockVerifier),
        )
        .unwrap();
        Fixture {
            kp,
            genesis,
            store,
            trxs,
            ingestor,
        }
    }

    fn trx(id: &str) -> Trx {
        Trx {
            trx_id: id.to_string(),
            group_id: "g".to_string(),
            sender_pubkey: [0u8; 32],
            data: id.as_bytes().to_vec(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_open_commits_genesis() {
        let f = fixture();
        assert_eq!(f.ingestor.tip().height, 0);
        assert_eq!(f.ingestor.tip().block_id, f.genesis.block_id);
        assert_eq!(f.store.committed_count(), 1);
    }

    #[test]
    fn test_add_child_advances_tip() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("t1")], &f.kp, 1).unwrap();

        let outcome = f.ingestor.add_block(b1.clone()).unwrap();

        match outcome {
            AddBlockOutcome::Committed { committed, tip, trimmed } => {
                assert_eq!(committed, vec![b1.block_id.clone()]);
                assert_eq!(tip.height, 1);
                assert!(trimmed.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(f.trxs.applied_log(), vec!["t1".to_string()]);
        assert_eq!(f.store.get_chain_tip("g").unwrap().unwrap().height, 1);
        assert_eq!(f.store.cached_count(), 0);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("t1")], &f.kp, 1).unwrap();

        f.ingestor.add_block(b1.clone()).unwrap();
        let tip = f.ingestor.tip();
        let again = f.ingestor.add_block(b1).unwrap();

        assert_eq!(again, AddBlockOutcome::AlreadySaved);
        assert_eq!(f.ingestor.tip(), tip);
        assert_eq!(f.trxs.applied_log().len(), 1);
    }

    #[test]
    fn test_repeated_reingest_of_committed_block() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("t1")], &f.kp, 1).unwrap();
        f.ingestor.add_block(b1.clone()).unwrap();
        let tip = f.ingestor.tip();

        for _ in 0..2 {
            assert_eq!(f.ingestor.add_block(b1.clone()).unwrap(), AddBlockOutcome::AlreadySaved);
        }
        assert_eq!(f.ingestor.tip(), tip);
        assert_eq!(f.store.committed_count(), 2);
        assert_eq!(f.trxs.applied_log(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_orphan_stays_quarantined_across_repeated_adds() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("t1")], &f.kp, 1).unwrap();
        let b2 = child_block(&b1, vec![trx("t2")], &f.kp, 2).unwrap();

        for _ in 0..4 {
            let err = f.ingestor.add_block(b2.clone()).unwrap_err();
            assert!(matches!(err, BlockError::ParentNotExist { .. }));
        }
        assert_eq!(f.store.committed_count(), 1);
        assert_eq!(f.store.cached_count(), 1);
        assert!(f.trxs.applied_log().is_empty());
        assert_eq!(f.ingestor.tip().height, 0);

        f.ingestor.add_block(b1).unwrap();
        assert_eq!(f.store.committed_count(), 3);
        assert_eq!(f.trxs.applied_log(), vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn test_orphan_quarantined_then_promoted_with_parent() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("t1")], &f.kp, 1).unwrap();
        let b2 = child_block(&b1, vec![trx("t2")], &f.kp, 2).unwrap();

        let err = f.ingestor.add_block(b2.clone()).unwrap_err();
        assert!(matches!(err, BlockError::ParentNotExist { .. }));
        assert!(f.store.block_exists(&b2.block_id, true).unwrap());
        assert!(!f.store.block_exists(&b2.block_id, false).unwrap());
        assert_eq!(f.ingestor.tip().height, 0);

        let outcome = f.ingestor.add_block(b1.clone()).unwrap();
        match outcome {
            AddBlockOutcome::Committed { committed, tip, .. } => {
                assert_eq!(committed, vec![b1.block_id.clone(), b2.block_id.clone()]);
                assert_eq!(tip.block_id, b2.block_id);
                assert_eq!(tip.height, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(f.trxs.applied_log(), vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(f.store.cached_count(), 0);
    }

    #[test]
    fn test_invalid_block_evicted() {
        let f = fixture();
        let mut b1 = child_block(&f.genesis, vec![], &f.kp, 1).unwrap();
        b1.prev_hash = [0x42; 32];

        let err = f.ingestor.add_block(b1.clone()).unwrap_err();
        assert!(matches!(
            err,
            BlockError::InvalidBlock {
                reason: InvalidReason::PrevHashMismatch,
                ..
            }
        ));
        assert!(!f.store.block_exists(&b1.block_id, true).unwrap());
        assert_eq!(f.ingestor.tip().height, 0);
    }

    #[test]
    fn test_duplicate_trx_applied_once() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![trx("dup")], &f.kp, 1).unwrap();
        let b2 = child_block(&b1, vec![trx("dup")], &f.kp, 2).unwrap();

        f.ingestor.add_block(b1).unwrap();
        f.ingestor.add_block(b2).unwrap();

        assert_eq!(f.trxs.applied_log(), vec!["dup".to_string()]);
        assert_eq!(f.trxs.saved_count(), 1);
    }

    fn sibling_tip_after(order_xy: bool) -> (BlockId, BlockId) {
        let f = fixture();
        let x = child_block(&f.genesis, vec![trx("x")], &f.kp, 1).unwrap();
        let y = child_block(&f.genesis, vec![trx("y")], &f.kp, 2).unwrap();
        let winner = if x.hash > y.hash { &x } else { &y };

        let (first, second) = if order_xy { (&x, &y) } else { (&y, &x) };
        f.ingestor.add_block(first.clone()).unwrap();
        f.ingestor.add_block(second.clone()).unwrap();

        (f.ingestor.tip().block_id, winner.block_id.clone())
    }

    #[test]
    fn test_equal_height_sibling_greater_hash_wins_either_order() {
        let (tip, winner) = sibling_tip_after(true);
        assert_eq!(tip, winner);

        let (tip, winner) = sibling_tip_after(false);
        assert_eq!(tip, winner);
    }

    #[test]
    fn test_branch_switch_reports_trimmed() {
        let f = fixture();
        let a1 = child_block(&f.genesis, vec![], &f.kp, 1).unwrap();
        let b1 = child_block(&f.genesis, vec![], &f.kp, 2).unwrap();
        let b2 = child_block(&b1, vec![], &f.kp, 3).unwrap();

        f.ingestor.add_block(a1.clone()).unwrap();
        f.ingestor.add_block(b1.clone()).unwrap();
        let outcome = f.ingestor.add_block(b2.clone()).unwrap();

        match outcome {
            AddBlockOutcome::Committed { tip, trimmed, .. } => {
                assert_eq!(tip.block_id, b2.block_id);
                // a1 only leaves the canonical path if it was the tip before b2.
                let a1_was_tip = a1.hash > b1.hash;
                assert_eq!(trimmed.contains(&a1.block_id), a1_was_tip);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_promote_cached_after_parent_commit() {
        let f = fixture();
        let b1 = child_block(&f.genesis, vec![], &f.kp, 1).unwrap();
        let b2 = child_block(&b1, vec![], &f.kp, 2).unwrap();

        // Simulate a crash between commit of b1 and promotion of b2.
        f.store.put_block(&b2, true).unwrap();
        f.store.put_block(&b1, false).unwrap();

        let promoted = f.ingestor.promote_cached().unwrap();
        assert_eq!(promoted, 1);
        assert_eq!(f.store.cached_count(), 0);
        assert_eq!(f.ingestor.tip().block_id, b2.block_id);
    }
}
