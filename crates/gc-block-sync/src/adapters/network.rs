//! In-process network hub.
//!
//! Nodes register an inbox and get an endpoint implementing
//! `ConnectionManager`. Producer-channel envelopes reach every other
//! producer, sync-channel envelopes reach the node subscribed to that name,
//! and block broadcasts reach every other node. [`pump`] feeds an inbox
//! into a [`BlockSyncApi`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Block, PublicKey};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::domain::SyncError;
use crate::ports::{BlockSyncApi, Channel, ConnectionManager};
use crate::protocol::SyncEnvelope;

/// Something delivered to a node's inbox.
#[derive(Clone, Debug)]
pub enum Delivery {
    /// Sync request or response.
    Envelope(SyncEnvelope),
    /// Newly produced block.
    Block(Block),
}

struct Peer {
    pubkey: PublicKey,
    producer: bool,
    channels: HashSet<String>,
    inbox: mpsc::UnboundedSender<Delivery>,
}

/// Shared hub connecting in-process nodes.
#[derive(Default)]
pub struct LocalNetwork {
    peers: RwLock<Vec<Peer>>,
}

impl LocalNetwork {
    /// Create an empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a node and return its inbox.
    pub fn register(
        &self,
        pubkey: PublicKey,
        producer: bool,
        sync_channel: String,
    ) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = HashSet::new();
        channels.insert(sync_channel);
        self.peers.write().push(Peer {
            pubkey,
            producer,
            channels,
            inbox: tx,
        });
        rx
    }

    /// Drop a node from the hub; later sends to it are discarded.
    pub fn unregister(&self, pubkey: &PublicKey) {
        self.peers.write().retain(|p| &p.pubkey != pubkey);
    }

    /// Endpoint sending on behalf of `pubkey`.
    pub fn endpoint(self: &Arc<Self>, pubkey: PublicKey) -> LocalEndpoint {
        LocalEndpoint {
            network: Arc::clone(self),
            pubkey,
        }
    }

    fn deliver<F>(&self, from: &PublicKey, delivery: Delivery, accept: F) -> usize
    where
        F: Fn(&Peer) -> bool,
    {
        let peers = self.peers.read();
        let mut delivered = 0;
        for peer in peers.iter().filter(|p| &p.pubkey != from && accept(p)) {
            if peer.inbox.send(delivery.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

/// A node's handle on the hub.
#[derive(Clone)]
pub struct LocalEndpoint {
    network: Arc<LocalNetwork>,
    pubkey: PublicKey,
}

#[async_trait]
impl ConnectionManager for LocalEndpoint {
    async fn send(&self, envelope: SyncEnvelope, channel: Channel) -> Result<(), SyncError> {
        let msg_type = envelope.msg_type;
        let delivered = match &channel {
            Channel::Producer(_) => {
                self.network
                    .deliver(&self.pubkey, Delivery::Envelope(envelope), |p| p.producer)
            }
            Channel::Sync(name) => self
                .network
                .deliver(&self.pubkey, Delivery::Envelope(envelope), |p| {
                    p.channels.contains(name)
                }),
        };
        trace!(?msg_type, ?channel, delivered, "Envelope sent");
        if delivered == 0 {
            debug!(?channel, "No peer listening on channel");
        }
        Ok(())
    }

    async fn broadcast_block(&self, block: &Block) -> Result<(), SyncError> {
        let delivered = self
            .network
            .deliver(&self.pubkey, Delivery::Block(block.clone()), |_| true);
        trace!(block_id = %block.block_id, delivered, "Block broadcast");
        Ok(())
    }
}

/// Feed a node's inbox into its API until `shutdown` flips or the hub drops
/// the node.
pub async fn pump(
    api: Arc<dyn BlockSyncApi>,
    mut inbox: mpsc::UnboundedReceiver<Delivery>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let delivery = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            delivery = inbox.recv() => match delivery {
                Some(d) => d,
                None => break,
            },
        };

        let result = match delivery {
            Delivery::Envelope(envelope) => api.handle_sync_envelope(envelope).await,
            Delivery::Block(block) => api.handle_block_broadcast(block).await.map(|_| ()),
        };
        match result {
            Ok(()) => {}
            Err(e @ (SyncError::NotSyncing | SyncError::UnknownSession { .. })) => {
                debug!(error = %e, "Late sync response dropped");
            }
            Err(e) => warn!(error = %e, "Delivery rejected"),
        }
    }
    debug!("Inbox pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MsgType;

    fn envelope() -> SyncEnvelope {
        SyncEnvelope {
            msg_type: MsgType::ReqBlockForward,
            group_id: "g".to_string(),
            sender_pubkey: [1u8; 32],
            nonce: [0u8; 24],
            payload: vec![],
            signature: [0u8; 64],
        }
    }

    #[tokio::test]
    async fn test_producer_channel_reaches_producers_only() {
        let net = LocalNetwork::new();
        let mut producer = net.register([2u8; 32], true, "s2".to_string());
        let mut follower = net.register([3u8; 32], false, "s3".to_string());

        net.endpoint([1u8; 32])
            .send(envelope(), Channel::Producer("g".to_string()))
            .await
            .unwrap();

        assert!(matches!(producer.try_recv(), Ok(Delivery::Envelope(_))));
        assert!(follower.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sync_channel_reaches_subscriber() {
        let net = LocalNetwork::new();
        let mut producer = net.register([2u8; 32], true, "s2".to_string());
        let mut follower = net.register([3u8; 32], false, "s3".to_string());

        net.endpoint([2u8; 32])
            .send(envelope(), Channel::Sync("s3".to_string()))
            .await
            .unwrap();

        assert!(matches!(follower.try_recv(), Ok(Delivery::Envelope(_))));
        assert!(producer.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sender_never_hears_itself() {
        let net = LocalNetwork::new();
        let mut me = net.register([2u8; 32], true, "s2".to_string());

        net.endpoint([2u8; 32])
            .send(envelope(), Channel::Producer("g".to_string()))
            .await
            .unwrap();

        assert!(me.try_recv().is_err());
    }
}
