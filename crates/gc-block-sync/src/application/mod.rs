//! # Application Module
//!
//! Sync sessions, response handling, the responder, and the `GroupChain`
//! facade behind the inbound port.

pub mod chain;
pub mod controller;
pub mod epoch;
pub mod responder;
pub mod response;

pub use chain::{GroupChain, GroupChainDeps};
pub use controller::{SessionDeps, SyncSessionController};
pub use epoch::{handle_req_blocks_resp, EpochOutcome};
pub use responder::SyncResponder;
pub use response::{handle_req_block_resp, BlockRespOutcome, IgnoreReason, RespContext};
