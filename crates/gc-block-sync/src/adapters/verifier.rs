//! Ed25519 producer signature verification.

use shared_crypto::{verify_signature, CryptoError};
use shared_types::Block;

use crate::ports::BlockVerifier;

/// Verifies `block.signature` over `block.hash` with the producer key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519BlockVerifier;

impl BlockVerifier for Ed25519BlockVerifier {
    fn verify_block_signature(&self, block: &Block) -> Result<(), CryptoError> {
        verify_signature(&block.producer_pubkey, &block.hash, &block.signature)
    }
}
