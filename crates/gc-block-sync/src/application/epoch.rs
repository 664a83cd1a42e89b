//! Epoch-batched sync: ranges of canonical blocks by height.

use tracing::warn;

use super::response::{IgnoreReason, RespContext};
use crate::domain::{BlockError, EpochFetchMeta, SyncError};
use crate::ingest::AddBlockOutcome;
use crate::protocol::{ReqBlocksResp, ResultCode};

/// Result of handling a `ReqBlocksResp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpochOutcome {
    /// Batch processed.
    Applied {
        /// Blocks committed or already present.
        applied: usize,
        /// Blocks left in quarantine.
        quarantined: usize,
        /// One past the highest committed height of the batch, or the
        /// requested height when nothing was committed.
        next_height: u64,
        /// No further batch is needed.
        finished: bool,
    },
    /// Producer has nothing at or above the requested height.
    SyncDone,
    /// Dropped silently.
    Ignored(IgnoreReason),
}

/// Validate and ingest a batch response.
///
/// Terminal codes (`BlockNotFound`, `BlockInRespOnTop`) only end the session
/// when sent by a producer. A batch in which some block could not be
/// committed never finishes the session, and a batch that commits nothing
/// leaves `next_height` at the requested height.
pub fn handle_req_blocks_resp(
    resp: &ReqBlocksResp,
    task: &EpochFetchMeta,
    ctx: &RespContext<'_>,
) -> Result<EpochOutcome, SyncError> {
    if &resp.requester_pubkey != ctx.me {
        return Ok(EpochOutcome::Ignored(IgnoreReason::NotForMe));
    }
    if resp.from_height != task.from_height {
        return Ok(EpochOutcome::Ignored(IgnoreReason::Mismatch));
    }

    let from_producer = ctx.producers.is_producer(&resp.provider_pubkey);
    if resp.result == ResultCode::BlockNotFound {
        return Ok(if from_producer {
            EpochOutcome::SyncDone
        } else {
            EpochOutcome::Ignored(IgnoreReason::NotFromProducer)
        });
    }

    let mut applied = 0;
    let mut quarantined = 0;
    let mut highest: Option<u64> = None;
    for block in &resp.blocks {
        if !ctx.producers.is_producer(&block.producer_pubkey) {
            warn!(block_id = %block.block_id, "Skipping block from untrusted producer");
            continue;
        }
        match ctx.ingestor.add_block(block.clone()) {
            Ok(AddBlockOutcome::Committed { .. }) | Ok(AddBlockOutcome::AlreadySaved) => {
                applied += 1;
                if let Some(height) = ctx.store.get_height(&block.block_id)? {
                    highest = highest.max(Some(height));
                }
            }
            Err(BlockError::ParentNotExist { .. }) => quarantined += 1,
            Err(BlockError::InvalidBlock { block_id, reason }) => {
                warn!(block_id = %block_id, %reason, "Invalid block in batch");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let complete = applied == resp.blocks.len();
    let on_top = resp.result == ResultCode::BlockInRespOnTop && from_producer;
    Ok(EpochOutcome::Applied {
        applied,
        quarantined,
        next_height: highest.map_or(task.from_height, |h| (h + 1).max(task.from_height)),
        finished: from_producer && (resp.blocks.is_empty() || (on_top && complete)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::{Ed25519BlockVerifier, InMemoryBlockStore, InMemoryTrxStore};
    use crate::domain::{child_block, genesis_block};
    use crate::ingest::BlockIngestor;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{Block, ProducerItem, ProducerPool, PublicKey};
    use uuid::Uuid;

    const ME: PublicKey = [0xAA; 32];

    fn setup() -> (Ed25519KeyPair, Block, Arc<InMemoryBlockStore>, BlockIngestor, ProducerPool) {
        let kp = Ed25519KeyPair::from_seed([31u8; 32]);
        let genesis = genesis_block("g", &kp, 0).unwrap();
        let store = Arc::new(InMemoryBlockStore::new());
        let ingestor = BlockIngestor::open(
            "g",
            &genesis,
            store.clone(),
            Arc::new(InMemoryTrxStore::new()),
            Arc::new(Ed25519BlockVerifier),
        )
        .unwrap();
        let mut pool = ProducerPool::new();
        pool.insert(ProducerItem {
            group_id: "g".to_string(),
            producer_pubkey: *kp.public_key().as_bytes(),
            owner_pubkey: *kp.public_key().as_bytes(),
            timestamp: 0,
            memo: String::new(),
        });
        (kp, genesis, store, ingestor, pool)
    }

    fn batch(provider: PublicKey, result: ResultCode, blocks: Vec<Block>) -> ReqBlocksResp {
        ReqBlocksResp {
            result,
            group_id: "g".to_string(),
            from_height: 1,
            requester_pubkey: ME,
            provider_pubkey: provider,
            session_id: Uuid::nil(),
            task_id: 1,
            blocks,
        }
    }

    const TASK: EpochFetchMeta = EpochFetchMeta {
        from_height: 1,
        count: 4,
    };

    #[test]
    fn test_batch_applied_and_continues() {
        let (kp, genesis, store, ingestor, pool) = setup();
        let b1 = child_block(&genesis, vec![], &kp, 1).unwrap();
        let b2 = child_block(&b1, vec![], &kp, 2).unwrap();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch(*kp.public_key().as_bytes(), ResultCode::BlockInResp, vec![b1, b2]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();

        assert_eq!(
            outcome,
            EpochOutcome::Applied {
                applied: 2,
                quarantined: 0,
                next_height: 3,
                finished: false
            }
        );
        assert_eq!(ingestor.tip().height, 2);
    }

    #[test]
    fn test_untrusted_block_stops_cursor_at_gap() {
        let (kp, genesis, store, ingestor, pool) = setup();
        let rogue = Ed25519KeyPair::from_seed([99u8; 32]);
        let b1 = child_block(&genesis, vec![], &kp, 1).unwrap();
        let b2 = child_block(&b1, vec![], &rogue, 2).unwrap();
        let b3 = child_block(&b2, vec![], &kp, 3).unwrap();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch(*kp.public_key().as_bytes(), ResultCode::BlockInRespOnTop, vec![b1, b2, b3]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();

        assert_eq!(
            outcome,
            EpochOutcome::Applied {
                applied: 1,
                quarantined: 1,
                next_height: 2,
                finished: false
            }
        );
        assert_eq!(ingestor.tip().height, 1);
    }

    #[test]
    fn test_untrusted_batch_keeps_requested_height() {
        let (kp, genesis, store, ingestor, pool) = setup();
        let rogue = Ed25519KeyPair::from_seed([98u8; 32]);
        let b1 = child_block(&genesis, vec![], &rogue, 1).unwrap();
        let b2 = child_block(&b1, vec![], &rogue, 2).unwrap();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch(*kp.public_key().as_bytes(), ResultCode::BlockInResp, vec![b1, b2]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();

        assert_eq!(
            outcome,
            EpochOutcome::Applied {
                applied: 0,
                quarantined: 0,
                next_height: 1,
                finished: false
            }
        );
    }

    #[test]
    fn test_on_top_from_producer_finishes() {
        let (kp, genesis, store, ingestor, pool) = setup();
        let b1 = child_block(&genesis, vec![], &kp, 1).unwrap();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch(*kp.public_key().as_bytes(), ResultCode::BlockInRespOnTop, vec![b1]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();
        assert!(matches!(outcome, EpochOutcome::Applied { finished: true, .. }));
    }

    #[test]
    fn test_empty_batch_from_non_producer_does_not_finish() {
        let (_kp, _genesis, store, ingestor, pool) = setup();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch([0x77; 32], ResultCode::BlockInResp, vec![]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();
        assert!(matches!(outcome, EpochOutcome::Applied { applied: 0, finished: false, .. }));
    }

    #[test]
    fn test_terminal_code_from_non_producer_ignored() {
        let (_kp, _genesis, store, ingestor, pool) = setup();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let r = batch([0x77; 32], ResultCode::BlockNotFound, vec![]);
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();
        assert_eq!(outcome, EpochOutcome::Ignored(IgnoreReason::NotFromProducer));
    }

    #[test]
    fn test_wrong_height_ignored() {
        let (kp, _genesis, store, ingestor, pool) = setup();
        let ctx = RespContext {
            me: &ME,
            producers: &pool,
            store: store.as_ref(),
            ingestor: &ingestor,
        };

        let mut r = batch(*kp.public_key().as_bytes(), ResultCode::BlockInResp, vec![]);
        r.from_height = 9;
        let outcome = handle_req_blocks_resp(&r, &TASK, &ctx).unwrap();
        assert_eq!(outcome, EpochOutcome::Ignored(IgnoreReason::Mismatch));
    }
}
