//! Sync request/response payloads.
//!
//! Every request carries the requester's session and task ids; responses
//! echo both so the requester can route and correlate them.

use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockId, GroupId, PublicKey};

use crate::domain::{SessionId, TaskId};

/// Outcome reported by a responder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    /// Nothing to return; the requester has reached the end.
    BlockNotFound,
    /// One block returned for a single-block request.
    BlockInTrx,
    /// Batch returned; more blocks follow.
    BlockInResp,
    /// Batch returned and it reaches the responder's tip.
    BlockInRespOnTop,
}

/// Single-block request. Sent as forward or backward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqBlock {
    /// Group.
    pub group_id: GroupId,
    /// Anchor block.
    pub block_id: BlockId,
    /// Node asking.
    pub requester_pubkey: PublicKey,
    /// Requester session.
    pub session_id: SessionId,
    /// Requester task.
    pub task_id: TaskId,
}

/// Single-block response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqBlockResp {
    /// Outcome.
    pub result: ResultCode,
    /// Group.
    pub group_id: GroupId,
    /// Anchor block of the request.
    pub block_id: BlockId,
    /// Node that asked.
    pub requester_pubkey: PublicKey,
    /// Node answering.
    pub provider_pubkey: PublicKey,
    /// Echoed session.
    pub session_id: SessionId,
    /// Echoed task.
    pub task_id: TaskId,
    /// Returned block, absent on `BlockNotFound`.
    pub block: Option<Block>,
}

/// Height-range request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqBlocks {
    /// Group.
    pub group_id: GroupId,
    /// First height.
    pub from_height: u64,
    /// Maximum number of blocks.
    pub count: u64,
    /// Node asking.
    pub requester_pubkey: PublicKey,
    /// Requester session.
    pub session_id: SessionId,
    /// Requester task.
    pub task_id: TaskId,
}

/// Height-range response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqBlocksResp {
    /// Outcome.
    pub result: ResultCode,
    /// Group.
    pub group_id: GroupId,
    /// First height of the request.
    pub from_height: u64,
    /// Node that asked.
    pub requester_pubkey: PublicKey,
    /// Node answering.
    pub provider_pubkey: PublicKey,
    /// Echoed session.
    pub session_id: SessionId,
    /// Echoed task.
    pub task_id: TaskId,
    /// Canonical blocks in height order.
    pub blocks: Vec<Block>,
}

/// Wire discriminator carried outside the sealed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MsgType {
    /// Ask for children.
    ReqBlockForward = 1,
    /// Ask for parent.
    ReqBlockBackward = 2,
    /// Single-block response.
    ReqBlockResp = 3,
    /// Range request.
    ReqBlocks = 4,
    /// Range response.
    ReqBlocksResp = 5,
}

/// Every message of both protocol generations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Ask for children of `block_id`.
    ReqBlockForward(ReqBlock),
    /// Ask for the parent of `block_id`.
    ReqBlockBackward(ReqBlock),
    /// Answer to a single-block request.
    ReqBlockResp(ReqBlockResp),
    /// Ask for a range of canonical blocks.
    ReqBlocks(ReqBlocks),
    /// Answer to a range request.
    ReqBlocksResp(ReqBlocksResp),
}

impl SyncMessage {
    /// Wire discriminator for this message.
    pub fn msg_type(&self) -> MsgType {
        match self {
            SyncMessage::ReqBlockForward(_) => MsgType::ReqBlockForward,
            SyncMessage::ReqBlockBackward(_) => MsgType::ReqBlockBackward,
            SyncMessage::ReqBlockResp(_) => MsgType::ReqBlockResp,
            SyncMessage::ReqBlocks(_) => MsgType::ReqBlocks,
            SyncMessage::ReqBlocksResp(_) => MsgType::ReqBlocksResp,
        }
    }

    /// Group the message belongs to.
    pub fn group_id(&self) -> &str {
        match self {
            SyncMessage::ReqBlockForward(r) | SyncMessage::ReqBlockBackward(r) => &r.group_id,
            SyncMessage::ReqBlockResp(r) => &r.group_id,
            SyncMessage::ReqBlocks(r) => &r.group_id,
            SyncMessage::ReqBlocksResp(r) => &r.group_id,
        }
    }

    /// Whether the message is a request served by the responder.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            SyncMessage::ReqBlockForward(_)
                | SyncMessage::ReqBlockBackward(_)
                | SyncMessage::ReqBlocks(_)
        )
    }
}

/// Response payload queued into a session dispatcher.
#[derive(Clone, Debug)]
pub enum SyncPayload {
    /// Single-block response.
    Block(ReqBlockResp),
    /// Range response.
    Epoch(ReqBlocksResp),
}

impl SyncPayload {
    /// Session the response claims to answer.
    pub fn session_id(&self) -> SessionId {
        match self {
            SyncPayload::Block(r) => r.session_id,
            SyncPayload::Epoch(r) => r.session_id,
        }
    }

    /// Task the response claims to answer.
    pub fn task_id(&self) -> TaskId {
        match self {
            SyncPayload::Block(r) => r.task_id,
            SyncPayload::Epoch(r) => r.task_id,
        }
    }
}
