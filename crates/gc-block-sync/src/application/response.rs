//! Validation of single-block responses.

use shared_types::{Block, BlockId, ProducerPool, PublicKey};
use tracing::debug;

use crate::domain::{BlockError, BlockFetchMeta, Direction, SyncError};
use crate::ingest::{AddBlockOutcome, BlockIngestor};
use crate::ports::BlockStore;
use crate::protocol::{ReqBlockResp, ResultCode};

/// Why a response was dropped without affecting the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Addressed to another requester.
    NotForMe,
    /// Embedded block does not answer the requested block.
    Mismatch,
    /// Terminal code from a node that is not a producer.
    NotFromProducer,
}

/// Result of handling a `ReqBlockResp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockRespOutcome {
    /// Block ingested (or already present).
    Accepted {
        /// Ingested block.
        block_id: BlockId,
        /// Ingestion result.
        outcome: AddBlockOutcome,
    },
    /// Block cached; its parent is still missing.
    Quarantined(Block),
    /// Responder has nothing further.
    SyncDone,
    /// Dropped silently.
    Ignored(IgnoreReason),
}

/// What response handling needs from the node.
pub struct RespContext<'a> {
    /// This node's key.
    pub me: &'a PublicKey,
    /// Trusted producers.
    pub producers: &'a ProducerPool,
    /// Block storage, for resolving the requested block.
    pub store: &'a dyn BlockStore,
    /// Ingestor that owns commits.
    pub ingestor: &'a BlockIngestor,
}

/// Validate a response against the task it should satisfy and ingest its block.
///
/// Responses for other requesters and blocks that do not correlate with the
/// request are ignored. A block authored outside the producer pool is an
/// explicit `UntrustedProducer` error.
pub fn handle_req_block_resp(
    resp: &ReqBlockResp,
    task: &BlockFetchMeta,
    ctx: &RespContext<'_>,
) -> Result<BlockRespOutcome, SyncError> {
    if &resp.requester_pubkey != ctx.me {
        return Ok(BlockRespOutcome::Ignored(IgnoreReason::NotForMe));
    }

    if resp.result == ResultCode::BlockNotFound {
        if !ctx.producers.is_producer(&resp.provider_pubkey) {
            return Ok(BlockRespOutcome::Ignored(IgnoreReason::NotFromProducer));
        }
        debug!(block_id = %resp.block_id, "Responder has no further block");
        return Ok(BlockRespOutcome::SyncDone);
    }

    let block = resp
        .block
        .as_ref()
        .ok_or_else(|| SyncError::MalformedResponse("response carries no block".to_string()))?;

    if !correlates(block, task, ctx.store)? {
        return Ok(BlockRespOutcome::Ignored(IgnoreReason::Mismatch));
    }

    if !ctx.producers.is_producer(&block.producer_pubkey) {
        return Err(SyncError::UntrustedProducer(hex::encode(block.producer_pubkey)));
    }

    match ctx.ingestor.add_block(block.clone()) {
        Ok(outcome) => Ok(BlockRespOutcome::Accepted {
            block_id: block.block_id.clone(),
            outcome,
        }),
        Err(BlockError::ParentNotExist { .. }) => Ok(BlockRespOutcome::Quarantined(block.clone())),
        Err(e) => Err(e.into()),
    }
}

/// Whether `block` is the neighbour the task asked for.
fn correlates(block: &Block, task: &BlockFetchMeta, store: &dyn BlockStore) -> Result<bool, SyncError> {
    match task.direction {
        Direction::Next => Ok(block.prev_block_id == task.block_id),
        Direction::Previous => {
            let requested = match store.get_block(&task.block_id, true)? {
                Some(b) => Some(b),
                None => store.get_block(&task.block_id, false)?,
            };
            Ok(requested.is_some_and(|r| r.prev_block_id == block.block_id))
        }
    }
}
