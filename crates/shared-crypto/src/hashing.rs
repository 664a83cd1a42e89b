//! SHA-256 block hashing.

use sha2::{Digest, Sha256};

/// SHA-256 output.
pub type Hash = [u8; 32];

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// First eight hex digits of a hash, for log fields.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}
