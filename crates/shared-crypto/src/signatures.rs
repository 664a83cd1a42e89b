//! # Ed25519 Signatures
//!
//! Node identities, block producer signatures and sync envelope signatures
//! all use Ed25519. Verification is strict: small-order keys and
//! non-canonical signatures are rejected.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::CryptoError;

/// A validated Ed25519 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey {
    key: VerifyingKey,
    bytes: [u8; 32],
}

impl Ed25519PublicKey {
    /// Parse raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|_| CryptoError::MalformedPublicKey(hex::encode(bytes)))?;
        Ok(Self { key, bytes })
    }

    /// Raw key bytes, as carried in blocks and envelopes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Lowercase hex, as used in channel names and logs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        self.key
            .verify_strict(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CryptoError::BadSignature)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw signature bytes.
    pub fn to_bytes(self) -> [u8; 64] {
        self.0
    }
}

/// A node's signing identity.
///
/// The signing key is zeroized on drop by `ed25519-dalek`.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Fresh random identity.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Identity derived from a 32-byte seed. Same seed, same key.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Public half of the identity.
    pub fn public_key(&self) -> Ed25519PublicKey {
        let key = self.signing_key.verifying_key();
        Ed25519PublicKey {
            key,
            bytes: key.to_bytes(),
        }
    }

    /// Sign `message`. Deterministic for a given key and message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair({})", self.public_key().to_hex())
    }
}

/// Check `signature` over `message` against raw key bytes.
pub fn verify_signature(pubkey: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
    Ed25519PublicKey::from_bytes(*pubkey)?.verify(message, &Ed25519Signature(*signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_signature_over_block_hash() {
        let producer = Ed25519KeyPair::from_seed([11u8; 32]);
        let block_hash = [0x5Au8; 32];
        let sig = producer.sign(&block_hash).to_bytes();

        assert!(verify_signature(producer.public_key().as_bytes(), &block_hash, &sig).is_ok());
    }

    #[test]
    fn test_altered_hash_rejected() {
        let producer = Ed25519KeyPair::from_seed([11u8; 32]);
        let sig = producer.sign(&[1u8; 32]);

        let result = producer.public_key().verify(&[2u8; 32], &sig);
        assert!(matches!(result, Err(CryptoError::BadSignature)));
    }

    #[test]
    fn test_other_node_key_rejected() {
        let alice = Ed25519KeyPair::generate();
        let bob = Ed25519KeyPair::generate();
        let sig = alice.sign(b"envelope").to_bytes();

        assert!(verify_signature(bob.public_key().as_bytes(), b"envelope", &sig).is_err());
    }

    #[test]
    fn test_seed_gives_stable_identity() {
        let a = Ed25519KeyPair::from_seed([0xABu8; 32]);
        let b = Ed25519KeyPair::from_seed([0xABu8; 32]);

        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"m").to_bytes(), b.sign(b"m").to_bytes());
    }

    #[test]
    fn test_hex_matches_bytes() {
        let pk = Ed25519KeyPair::from_seed([3u8; 32]).public_key();
        assert_eq!(pk.to_hex(), hex::encode(pk.as_bytes()));
        assert_eq!(pk.to_hex().len(), 64);
    }
}
