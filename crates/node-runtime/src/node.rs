//! # Group Node
//!
//! One node's replica of a group chain, wired onto the in-process network
//! with its own inbox pump.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gc_block_sync::{
    pump, sync_channel_name, BlockSyncApi, Ed25519BlockVerifier, GroupChain, GroupChainDeps,
    InMemoryBlockStore, InMemoryTrxStore, LocalNetwork, SealedEnvelopeFactory, SyncConfig,
    SyncerStatus,
};
use shared_crypto::{Ed25519KeyPair, SecretKey};
use shared_types::{Block, ProducerPool, PublicKey};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything needed to join a group.
pub struct NodeParams<'a> {
    /// Name used in logs.
    pub name: String,
    /// Node identity.
    pub keypair: Arc<Ed25519KeyPair>,
    /// Group cipher key.
    pub group_key: SecretKey,
    /// Group root.
    pub genesis: &'a Block,
    /// Trusted producers.
    pub producers: ProducerPool,
    /// Sync engine configuration.
    pub sync: SyncConfig,
    /// Whether this node produces blocks.
    pub producer: bool,
}

/// A running node.
pub struct GroupNode {
    name: String,
    pubkey: PublicKey,
    chain: Arc<GroupChain>,
    network: Arc<LocalNetwork>,
    shutdown_tx: watch::Sender<bool>,
    pump: JoinHandle<()>,
}

impl GroupNode {
    /// Register on `network` and start pumping the inbox.
    pub fn join(network: &Arc<LocalNetwork>, params: NodeParams<'_>) -> Result<Self> {
        let pubkey = *params.keypair.public_key().as_bytes();
        let channel = sync_channel_name(&params.sync.sync_channel_prefix, &params.genesis.group_id, &pubkey);
        let inbox = network.register(pubkey, params.producer, channel);

        let deps = GroupChainDeps {
            store: Arc::new(InMemoryBlockStore::new()),
            trxs: Arc::new(InMemoryTrxStore::new()),
            verifier: Arc::new(Ed25519BlockVerifier),
            conn: Arc::new(network.endpoint(pubkey)),
            envelopes: Arc::new(SealedEnvelopeFactory::new(
                params.genesis.group_id.clone(),
                params.group_key,
                Arc::clone(&params.keypair),
            )),
            producer_key: params.producer.then(|| Arc::clone(&params.keypair)),
        };
        let chain = Arc::new(
            GroupChain::open(params.sync, params.genesis, params.producers, deps)
                .with_context(|| format!("failed to open group chain on {}", params.name))?,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let api: Arc<dyn BlockSyncApi> = chain.clone();
        let pump = tokio::spawn(pump(api, inbox, shutdown_rx));

        info!(node = %params.name, pubkey = %hex::encode(pubkey), producer = params.producer, "Node joined group");
        Ok(Self {
            name: params.name,
            pubkey,
            chain,
            network: Arc::clone(network),
            shutdown_tx,
            pump,
        })
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's group chain.
    pub fn chain(&self) -> &Arc<GroupChain> {
        &self.chain
    }

    /// Poll until no session is running; returns the final status.
    pub async fn wait_until_settled(&self, poll: Duration) -> SyncerStatus {
        loop {
            let status = self.chain.syncer_status();
            if !status.is_syncing() {
                return status;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop syncing, stop the pump and leave the network.
    pub async fn shutdown(self) {
        self.chain.stop_sync().await;
        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.pump.await {
            warn!(node = %self.name, error = %e, "Inbox pump panicked");
        }
        self.network.unregister(&self.pubkey);
        info!(node = %self.name, "Node stopped");
    }
}
