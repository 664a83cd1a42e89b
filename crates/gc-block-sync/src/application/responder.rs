//! Serves sync requests from other nodes.
//!
//! Forward requests are answered with every committed child of the
//! requested block, backward requests with its committed parent, and range
//! requests with a slice of the canonical chain. Replies go to the
//! requester's sync channel.

use std::sync::Arc;

use shared_types::{Block, GroupId};
use tracing::{debug, info};

use crate::algorithms::canonical_path;
use crate::domain::SyncError;
use crate::ingest::BlockIngestor;
use crate::ports::{BlockStore, Channel, ConnectionManager, EnvelopeFactory};
use crate::protocol::{
    sync_channel_name, ReqBlock, ReqBlockResp, ReqBlocks, ReqBlocksResp, ResultCode, SyncMessage,
};

/// Answers `ReqBlockForward`, `ReqBlockBackward` and `ReqBlocks`.
pub struct SyncResponder {
    group_id: GroupId,
    channel_prefix: String,
    store: Arc<dyn BlockStore>,
    ingestor: Arc<BlockIngestor>,
    conn: Arc<dyn ConnectionManager>,
    envelopes: Arc<dyn EnvelopeFactory>,
}

impl SyncResponder {
    /// Create a responder for `group_id`.
    pub fn new(
        group_id: impl Into<GroupId>,
        channel_prefix: impl Into<String>,
        store: Arc<dyn BlockStore>,
        ingestor: Arc<BlockIngestor>,
        conn: Arc<dyn ConnectionManager>,
        envelopes: Arc<dyn EnvelopeFactory>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            channel_prefix: channel_prefix.into(),
            store,
            ingestor,
            conn,
            envelopes,
        }
    }

    /// Answer a request. Returns the number of responses sent.
    ///
    /// Requests from this node, for other groups, and non-requests are
    /// skipped.
    pub async fn handle_request(&self, msg: &SyncMessage) -> Result<usize, SyncError> {
        if msg.group_id() != self.group_id {
            return Ok(0);
        }
        let me = self.envelopes.local_pubkey();

        let (requester, responses) = match msg {
            SyncMessage::ReqBlockForward(req) if req.requester_pubkey != me => {
                (req.requester_pubkey, self.forward(req)?)
            }
            SyncMessage::ReqBlockBackward(req) if req.requester_pubkey != me => {
                (req.requester_pubkey, vec![self.backward(req)?])
            }
            SyncMessage::ReqBlocks(req) if req.requester_pubkey != me => {
                (req.requester_pubkey, vec![self.range(req)?])
            }
            _ => return Ok(0),
        };

        let channel = Channel::Sync(sync_channel_name(&self.channel_prefix, &self.group_id, &requester));
        let count = responses.len();
        for response in responses {
            let envelope = self.envelopes.seal(&response)?;
            self.conn.send(envelope, channel.clone()).await?;
        }
        debug!(msg_type = ?msg.msg_type(), count, "Answered sync request");
        Ok(count)
    }

    fn block_resp(&self, req: &ReqBlock, result: ResultCode, block: Option<Block>) -> SyncMessage {
        SyncMessage::ReqBlockResp(ReqBlockResp {
            result,
            group_id: self.group_id.clone(),
            block_id: req.block_id.clone(),
            requester_pubkey: req.requester_pubkey,
            provider_pubkey: self.envelopes.local_pubkey(),
            session_id: req.session_id,
            task_id: req.task_id,
            block,
        })
    }

    fn forward(&self, req: &ReqBlock) -> Result<Vec<SyncMessage>, SyncError> {
        let children = if self.store.block_exists(&req.block_id, false)? {
            self.store.get_sub_blocks(&req.block_id)?
        } else {
            Vec::new()
        };
        if children.is_empty() {
            return Ok(vec![self.block_resp(req, ResultCode::BlockNotFound, None)]);
        }
        Ok(children
            .into_iter()
            .map(|child| self.block_resp(req, ResultCode::BlockInTrx, Some(child)))
            .collect())
    }

    fn backward(&self, req: &ReqBlock) -> Result<SyncMessage, SyncError> {
        let requested = match self.store.get_block(&req.block_id, false)? {
            Some(b) => Some(b),
            None => self.store.get_block(&req.block_id, true)?,
        };
        let parent = match requested {
            Some(b) if !b.is_genesis() => self.store.get_block(&b.prev_block_id, false)?,
            _ => None,
        };
        Ok(match parent {
            Some(parent) => self.block_resp(req, ResultCode::BlockInTrx, Some(parent)),
            None => self.block_resp(req, ResultCode::BlockNotFound, None),
        })
    }

    fn range(&self, req: &ReqBlocks) -> Result<SyncMessage, SyncError> {
        let tip = self.ingestor.tip();
        let mut result = ResultCode::BlockNotFound;
        let mut blocks = Vec::new();

        if req.from_height <= tip.height && req.count > 0 {
            let mut path = canonical_path(self.store.as_ref(), &tip)?;
            path.reverse();
            let end = req.from_height.saturating_add(req.count).min(tip.height + 1);
            for block_id in &path[req.from_height as usize..end as usize] {
                if let Some(block) = self.store.get_block(block_id, false)? {
                    blocks.push(block);
                }
            }
            result = if end > tip.height {
                ResultCode::BlockInRespOnTop
            } else {
                ResultCode::BlockInResp
            };
            info!(from = req.from_height, returned = blocks.len(), ?result, "Serving block range");
        }

        Ok(SyncMessage::ReqBlocksResp(ReqBlocksResp {
            result,
            group_id: self.group_id.clone(),
            from_height: req.from_height,
            requester_pubkey: req.requester_pubkey,
            provider_pubkey: self.envelopes.local_pubkey(),
            session_id: req.session_id,
            task_id: req.task_id,
            blocks,
        }))
    }
}
