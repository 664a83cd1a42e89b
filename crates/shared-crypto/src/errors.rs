//! Crypto error types.

use thiserror::Error;

/// Failures of the group cipher and of Ed25519 checks.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The AEAD refused to seal the payload.
    #[error("Sealing with the group key failed")]
    SealFailed,

    /// Wrong group key, wrong group binding, or tampered ciphertext.
    #[error("Opening with the group key failed")]
    OpenFailed,

    /// Signature does not match the key and message.
    #[error("Bad Ed25519 signature")]
    BadSignature,

    /// Public key bytes are not a valid curve point.
    #[error("Malformed Ed25519 public key {0}")]
    MalformedPublicKey(String),
}
