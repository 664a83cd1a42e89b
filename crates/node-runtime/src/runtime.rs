//! # Demo Runtime
//!
//! A producer and a follower on one in-process network. The producer builds
//! a short chain before the follower joins; the follower then catches up
//! with a forward sync session.
//!
//! ```text
//!  producer ──produce × N──→ chain at height N
//!  follower ──join──→ start_sync ──ReqBlockForward──→ producer
//!      ▲                                                 │
//!      └──────────────── ReqBlockResp (sync channel) ────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gc_block_sync::{genesis_block, BlockSyncApi, LocalNetwork, SyncerStatus};
use shared_crypto::{Ed25519KeyPair, SecretKey};
use shared_types::{Block, ChainTip, ProducerItem, ProducerPool, Trx};
use tracing::info;

use crate::config::NodeConfig;
use crate::node::{GroupNode, NodeParams};

/// Final state of a demo run.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// Producer tip.
    pub producer_tip: ChainTip,
    /// Follower tip.
    pub follower_tip: ChainTip,
    /// Follower status once settled.
    pub follower_status: SyncerStatus,
}

/// Producer and follower sharing one network.
pub struct NodeRuntime {
    config: NodeConfig,
    network: Arc<LocalNetwork>,
    producer: GroupNode,
    follower: Option<GroupNode>,
    group_key: SecretKey,
    pool: ProducerPool,
    genesis: Block,
}

impl NodeRuntime {
    /// Create the group and bring up the producer.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let network = LocalNetwork::new();
        let producer_key = Arc::new(Ed25519KeyPair::generate());
        let group_key = SecretKey::generate();
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let genesis = genesis_block(&config.group_id, &producer_key, now).context("failed to build genesis")?;

        let producer_pubkey = *producer_key.public_key().as_bytes();
        let mut pool = ProducerPool::new();
        pool.insert(ProducerItem {
            group_id: config.group_id.clone(),
            producer_pubkey,
            owner_pubkey: producer_pubkey,
            timestamp: now,
            memo: "demo producer".to_string(),
        });

        let producer = GroupNode::join(
            &network,
            NodeParams {
                name: format!("{}-producer", config.node_name),
                keypair: producer_key,
                group_key: group_key.clone(),
                genesis: &genesis,
                producers: pool.clone(),
                sync: config.sync.clone(),
                producer: true,
            },
        )?;

        info!(group_id = %config.group_id, genesis = %genesis.block_id, "Group created");
        Ok(Self {
            config,
            network,
            producer,
            follower: None,
            group_key,
            pool,
            genesis,
        })
    }

    /// Producer node.
    pub fn producer(&self) -> &GroupNode {
        &self.producer
    }

    /// Follower node, once joined.
    pub fn follower(&self) -> Option<&GroupNode> {
        self.follower.as_ref()
    }

    /// Produce the demo chain, then bring up the follower and start its sync.
    pub async fn start(&mut self) -> Result<()> {
        for i in 0..self.config.demo_blocks {
            let trx = Trx {
                trx_id: format!("demo-trx-{i}"),
                group_id: self.config.group_id.clone(),
                sender_pubkey: self.producer.chain().local_pubkey(),
                data: format!("demo payload {i}").into_bytes(),
                timestamp: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            };
            self.producer
                .chain()
                .produce_block(vec![trx])
                .await
                .context("failed to produce demo block")?;
        }
        info!(tip = ?self.producer.chain().chain_tip(), "Demo chain produced");

        let follower = GroupNode::join(
            &self.network,
            NodeParams {
                name: format!("{}-follower", self.config.node_name),
                keypair: Arc::new(Ed25519KeyPair::generate()),
                group_key: self.group_key.clone(),
                genesis: &self.genesis,
                producers: self.pool.clone(),
                sync: self.config.sync.clone(),
                producer: false,
            },
        )?;
        follower.chain().start_sync().await.context("failed to start sync")?;
        self.follower = Some(follower);
        Ok(())
    }

    /// Wait for the follower's session to end.
    pub async fn wait_for_sync(&self, poll: Duration) -> Result<DemoReport> {
        let follower = self.follower.as_ref().context("follower not started")?;
        let follower_status = follower.wait_until_settled(poll).await;
        Ok(DemoReport {
            producer_tip: self.producer.chain().chain_tip(),
            follower_tip: follower.chain().chain_tip(),
            follower_status,
        })
    }

    /// Stop both nodes.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Some(follower) = self.follower {
            follower.shutdown().await;
        }
        self.producer.shutdown().await;
        info!("Shutdown complete");
    }
}
