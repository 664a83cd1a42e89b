//! # Ports Layer
//!
//! Inbound API and outbound dependency traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{BlockSyncApi, BroadcastOutcome};
pub use outbound::{
    BlockStore, BlockVerifier, Channel, ConnectionManager, EnvelopeFactory, RecordingConnection,
    TrxStore,
};
