//! Sealed envelope factory.
//!
//! The message is bincode-encoded, sealed with the group key bound to the
//! group id, and the envelope is signed with the node identity.

use std::sync::Arc;

use shared_crypto::{open_payload, seal_payload, verify_signature, Ed25519KeyPair, SealedBox, SecretKey};
use shared_types::{GroupId, PublicKey};

use crate::domain::CodecError;
use crate::ports::EnvelopeFactory;
use crate::protocol::{SyncEnvelope, SyncMessage};

/// Builds and opens envelopes for one group.
pub struct SealedEnvelopeFactory {
    group_id: GroupId,
    group_key: SecretKey,
    keypair: Arc<Ed25519KeyPair>,
}

impl SealedEnvelopeFactory {
    /// Factory signing with `keypair` and sealing with the group key.
    pub fn new(group_id: impl Into<GroupId>, group_key: SecretKey, keypair: Arc<Ed25519KeyPair>) -> Self {
        Self {
            group_id: group_id.into(),
            group_key,
            keypair,
        }
    }
}

impl EnvelopeFactory for SealedEnvelopeFactory {
    fn local_pubkey(&self) -> PublicKey {
        *self.keypair.public_key().as_bytes()
    }

    fn seal(&self, msg: &SyncMessage) -> Result<SyncEnvelope, CodecError> {
        if msg.group_id() != self.group_id {
            return Err(CodecError::GroupMismatch {
                expected: self.group_id.clone(),
                got: msg.group_id().to_string(),
            });
        }

        let plain = bincode::serialize(msg).map_err(|e| CodecError::Serialization(e.to_string()))?;
        let SealedBox { nonce, ciphertext: payload } = seal_payload(&self.group_key, &self.group_id, &plain)?;
        let msg_type = msg.msg_type();

        let signature = self
            .keypair
            .sign(&SyncEnvelope::signing_bytes(msg_type, &self.group_id, &nonce, &payload))
            .to_bytes();

        Ok(SyncEnvelope {
            msg_type,
            group_id: self.group_id.clone(),
            sender_pubkey: self.local_pubkey(),
            nonce,
            payload,
            signature,
        })
    }

    fn open(&self, envelope: &SyncEnvelope) -> Result<SyncMessage, CodecError> {
        if envelope.group_id != self.group_id {
            return Err(CodecError::GroupMismatch {
                expected: self.group_id.clone(),
                got: envelope.group_id.clone(),
            });
        }

        verify_signature(
            &envelope.sender_pubkey,
            &envelope.own_signing_bytes(),
            &envelope.signature,
        )?;

        let sealed = SealedBox {
            nonce: envelope.nonce,
            ciphertext: envelope.payload.clone(),
        };
        let plain = open_payload(&self.group_key, &self.group_id, &sealed)?;
        let msg: SyncMessage =
            bincode::deserialize(&plain).map_err(|e| CodecError::Serialization(e.to_string()))?;

        if msg.msg_type() != envelope.msg_type {
            return Err(CodecError::TypeMismatch);
        }
        if msg.group_id() != self.group_id {
            return Err(CodecError::GroupMismatch {
                expected: self.group_id.clone(),
                got: msg.group_id().to_string(),
            });
        }
        Ok(msg)
    }
}
