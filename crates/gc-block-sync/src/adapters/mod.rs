//! # Adapters
//!
//! In-process implementations of the outbound ports.

pub mod envelope;
pub mod memory;
pub mod network;
pub mod verifier;

pub use envelope::SealedEnvelopeFactory;
pub use memory::{InMemoryBlockStore, InMemoryTrxStore};
pub use network::{pump, Delivery, LocalEndpoint, LocalNetwork};
pub use verifier::Ed25519BlockVerifier;
