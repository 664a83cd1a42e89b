//! # Shared Crypto
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `cipher` | XChaCha20-Poly1305 | Sealing sync payloads with the group key |
//! | `hashing` | SHA-256 | Block hashes |
//! | `signatures` | Ed25519 | Producer and envelope signatures |
//!
//! ## Security Properties
//!
//! - **XChaCha20**: 192-bit nonce, safe to generate at random per message
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cipher;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use cipher::{open_payload, seal_payload, SealedBox, SecretKey, NONCE_LEN};
pub use errors::CryptoError;
pub use hashing::{sha256, short_hex, Hash};
pub use signatures::{verify_signature, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
