//! # Sync Protocol
//!
//! Wire types of both protocol generations, modelled as tagged variants of
//! one `SyncMessage` enum and carried in a signed `SyncEnvelope`.

pub mod envelope;
pub mod messages;

pub use envelope::{sync_channel_name, SyncEnvelope};
pub use messages::{
    MsgType, ReqBlock, ReqBlockResp, ReqBlocks, ReqBlocksResp, ResultCode, SyncMessage,
    SyncPayload,
};
