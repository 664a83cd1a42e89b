//! Signed, sealed wire envelope.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{GroupId, PublicKey, Signature};

use super::messages::MsgType;

/// A sync message on the wire.
///
/// `payload` is the bincode-encoded `SyncMessage` encrypted with the group
/// key. `signature` is the sender's Ed25519 signature over
/// [`SyncEnvelope::signing_bytes`].
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// Payload discriminator, readable without the group key.
    pub msg_type: MsgType,
    /// Group.
    pub group_id: GroupId,
    /// Signing node.
    pub sender_pubkey: PublicKey,
    /// Cipher nonce.
    pub nonce: [u8; 24],
    /// Sealed payload.
    pub payload: Vec<u8>,
    /// Sender signature.
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl SyncEnvelope {
    /// Bytes covered by the envelope signature.
    pub fn signing_bytes(
        msg_type: MsgType,
        group_id: &str,
        nonce: &[u8; 24],
        payload: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + group_id.len() + nonce.len() + payload.len());
        out.push(msg_type as u8);
        out.extend_from_slice(group_id.as_bytes());
        out.extend_from_slice(nonce);
        out.extend_from_slice(payload);
        out
    }

    /// Signing bytes of this envelope.
    pub fn own_signing_bytes(&self) -> Vec<u8> {
        Self::signing_bytes(self.msg_type, &self.group_id, &self.nonce, &self.payload)
    }
}

/// Name of the channel a requester listens on for responses.
pub fn sync_channel_name(prefix: &str, group_id: &str, requester: &PublicKey) -> String {
    format!("{prefix}{group_id}{}", hex::encode(requester))
}
