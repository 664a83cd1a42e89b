//! # Group Cipher
//!
//! Sync payloads are sealed with the group's shared XChaCha20-Poly1305 key.
//! The group id is bound as associated data, so a box sealed for one group
//! never opens under another group's id even if the keys collide.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use zeroize::Zeroize;

use crate::CryptoError;

/// XChaCha20 nonce length.
pub const NONCE_LEN: usize = 24;

/// Shared group key (256-bit). Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh random group key.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(&self.0.into())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Ciphertext plus the random nonce it was sealed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedBox {
    /// Random per-message nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the Poly1305 tag appended.
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` for `group_id`.
pub fn seal_payload(key: &SecretKey, group_id: &str, plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
    let nonce: [u8; NONCE_LEN] = rand::random();
    let ciphertext = key
        .cipher()
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: group_id.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::SealFailed)?;
    Ok(SealedBox { nonce, ciphertext })
}

/// Open a box sealed for `group_id`.
pub fn open_payload(key: &SecretKey, group_id: &str, sealed: &SealedBox) -> Result<Vec<u8>, CryptoError> {
    key.cipher()
        .decrypt(
            XNonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: group_id.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::OpenFailed)
}
