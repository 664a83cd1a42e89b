//! Shared fixtures for multi-node tests.

use std::sync::Arc;
use std::time::Duration;

use gc_block_sync::{genesis_block, LocalNetwork, SyncConfig, SyncerStatus};
use node_runtime::{GroupNode, NodeParams};
use shared_crypto::{Ed25519KeyPair, SecretKey};
use shared_types::{Block, ProducerItem, ProducerPool};

/// Group id used by every fixture.
pub const GROUP_ID: &str = "test-group";

/// A group: network, keys, genesis and producer pool.
pub struct TestGroup {
    /// Shared in-process network.
    pub network: Arc<LocalNetwork>,
    /// Group cipher key.
    pub group_key: SecretKey,
    /// Group root, signed by the first producer.
    pub genesis: Block,
    /// Trusted producers.
    pub pool: ProducerPool,
    /// Producer identities, in pool order.
    pub producer_keys: Vec<Arc<Ed25519KeyPair>>,
    /// Sync configuration for every node.
    pub sync: SyncConfig,
}

impl TestGroup {
    /// Group with `producers` deterministic producer keys.
    pub fn new(producers: usize, sync: SyncConfig) -> Self {
        assert!(producers > 0, "a group needs a producer");
        let producer_keys: Vec<_> = (0..producers)
            .map(|i| Arc::new(Ed25519KeyPair::from_seed([100 + i as u8; 32])))
            .collect();

        let mut pool = ProducerPool::new();
        for key in &producer_keys {
            let pubkey = *key.public_key().as_bytes();
            pool.insert(ProducerItem {
                group_id: GROUP_ID.to_string(),
                producer_pubkey: pubkey,
                owner_pubkey: pubkey,
                timestamp: 0,
                memo: String::new(),
            });
        }

        let genesis = genesis_block(GROUP_ID, &producer_keys[0], 0).expect("genesis");
        Self {
            network: LocalNetwork::new(),
            group_key: SecretKey::from_bytes([42u8; 32]),
            genesis,
            pool,
            producer_keys,
            sync,
        }
    }

    fn join(&self, name: &str, keypair: Arc<Ed25519KeyPair>, group_key: SecretKey, producer: bool) -> GroupNode {
        GroupNode::join(
            &self.network,
            NodeParams {
                name: name.to_string(),
                keypair,
                group_key,
                genesis: &self.genesis,
                producers: self.pool.clone(),
                sync: self.sync.clone(),
                producer,
            },
        )
        .expect("join group")
    }

    /// Join producer number `index`.
    pub fn join_producer(&self, index: usize) -> GroupNode {
        let key = Arc::clone(&self.producer_keys[index]);
        self.join(&format!("producer-{index}"), key, self.group_key.clone(), true)
    }

    /// Join a follower with a fresh identity.
    pub fn join_follower(&self, name: &str) -> GroupNode {
        self.join(name, Arc::new(Ed25519KeyPair::generate()), self.group_key.clone(), false)
    }

    /// Join a node holding the wrong group key.
    pub fn join_outsider(&self, name: &str) -> GroupNode {
        self.join(name, Arc::new(Ed25519KeyPair::generate()), SecretKey::generate(), false)
    }
}

/// Produce `count` empty blocks on `producer`.
pub async fn produce(producer: &GroupNode, count: usize) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        blocks.push(producer.chain().produce_block(vec![]).await.expect("produce block"));
    }
    blocks
}

/// Poll `cond` until it holds; panics after `within`.
pub async fn eventually<F>(what: &str, within: Duration, cond: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Default wait for convergence.
pub const SETTLE: Duration = Duration::from_secs(5);

/// Wait for `node`'s session to end; panics after [`SETTLE`].
pub async fn settle(node: &GroupNode) -> SyncerStatus {
    tokio::time::timeout(SETTLE, node.wait_until_settled(Duration::from_millis(5)))
        .await
        .expect("sync session did not settle")
}
