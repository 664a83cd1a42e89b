//! # Group Chain
//!
//! One node's view of one group: ingestion, the sync session controller and
//! the responder behind the `BlockSyncApi` port.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::Ed25519KeyPair;
use shared_types::{Block, ChainTip, GroupId, ProducerPool, PublicKey, Trx};
use tracing::{debug, info, warn};

use super::controller::{SessionDeps, SyncSessionController};
use super::responder::SyncResponder;
use crate::config::SyncConfig;
use crate::domain::{child_block, BlockError, InvalidReason, SyncError, SyncerStatus};
use crate::ingest::{AddBlockOutcome, BlockIngestor};
use crate::ports::{
    BlockStore, BlockSyncApi, BlockVerifier, BroadcastOutcome, ConnectionManager, EnvelopeFactory,
    TrxStore,
};
use crate::protocol::{sync_channel_name, SyncEnvelope, SyncMessage, SyncPayload};

/// Outbound dependencies of a group chain.
pub struct GroupChainDeps {
    /// Block storage.
    pub store: Arc<dyn BlockStore>,
    /// Transaction storage.
    pub trxs: Arc<dyn TrxStore>,
    /// Block signature verification.
    pub verifier: Arc<dyn BlockVerifier>,
    /// Transport.
    pub conn: Arc<dyn ConnectionManager>,
    /// Envelope sealing with the group key.
    pub envelopes: Arc<dyn EnvelopeFactory>,
    /// Signing key, when this node produces blocks.
    pub producer_key: Option<Arc<Ed25519KeyPair>>,
}

/// A node's replica of one group chain.
pub struct GroupChain {
    group_id: GroupId,
    config: SyncConfig,
    store: Arc<dyn BlockStore>,
    ingestor: Arc<BlockIngestor>,
    producers: Arc<RwLock<ProducerPool>>,
    controller: SyncSessionController,
    responder: SyncResponder,
    conn: Arc<dyn ConnectionManager>,
    envelopes: Arc<dyn EnvelopeFactory>,
    producer_key: Option<Arc<Ed25519KeyPair>>,
}

impl GroupChain {
    /// Open the chain rooted at `genesis`, resuming from a stored tip if any.
    pub fn open(
        config: SyncConfig,
        genesis: &Block,
        producers: ProducerPool,
        deps: GroupChainDeps,
    ) -> Result<Self, SyncError> {
        let group_id = genesis.group_id.clone();
        let ingestor = Arc::new(BlockIngestor::open(
            group_id.clone(),
            genesis,
            Arc::clone(&deps.store),
            deps.trxs,
            deps.verifier,
        )?);
        let producers = Arc::new(RwLock::new(producers));

        let controller = SyncSessionController::new(
            config.clone(),
            group_id.clone(),
            SessionDeps {
                ingestor: Arc::clone(&ingestor),
                store: Arc::clone(&deps.store),
                producers: Arc::clone(&producers),
                conn: Arc::clone(&deps.conn),
                envelopes: Arc::clone(&deps.envelopes),
            },
        );
        let responder = SyncResponder::new(
            group_id.clone(),
            config.sync_channel_prefix.clone(),
            Arc::clone(&deps.store),
            Arc::clone(&ingestor),
            Arc::clone(&deps.conn),
            Arc::clone(&deps.envelopes),
        );

        info!(group_id = %group_id, tip = ?ingestor.tip(), "Group chain opened");
        Ok(Self {
            group_id,
            config,
            store: deps.store,
            ingestor,
            producers,
            controller,
            responder,
            conn: deps.conn,
            envelopes: deps.envelopes,
            producer_key: deps.producer_key,
        })
    }

    /// Group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// This node's public key.
    pub fn local_pubkey(&self) -> PublicKey {
        self.envelopes.local_pubkey()
    }

    /// Channel on which this node receives sync responses.
    pub fn sync_channel(&self) -> String {
        sync_channel_name(&self.config.sync_channel_prefix, &self.group_id, &self.local_pubkey())
    }

    /// Shared producer pool.
    pub fn producers(&self) -> Arc<RwLock<ProducerPool>> {
        Arc::clone(&self.producers)
    }

    /// Commit path.
    pub fn ingestor(&self) -> &Arc<BlockIngestor> {
        &self.ingestor
    }

    /// Session controller.
    pub fn controller(&self) -> &SyncSessionController {
        &self.controller
    }

    /// Build, commit and broadcast a block on the current tip.
    pub async fn produce_block(&self, trxs: Vec<Trx>) -> Result<Block, SyncError> {
        let me = self.local_pubkey();
        let trusted = self.producers.read().is_producer(&me);
        let keypair = match &self.producer_key {
            Some(kp) if trusted => kp,
            _ => return Err(SyncError::UntrustedProducer(hex::encode(me))),
        };

        let tip = self.ingestor.tip();
        let parent = self
            .store
            .get_block(&tip.block_id, false)?
            .ok_or_else(|| SyncError::BlockNotFound(tip.block_id.clone()))?;
        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let block = child_block(&parent, trxs, keypair, timestamp)?;

        self.ingestor.add_block(block.clone())?;
        self.conn.broadcast_block(&block).await?;
        info!(block_id = %block.block_id, height = tip.height + 1, trxs = block.trxs.len(), "Produced block");
        Ok(block)
    }
}

#[async_trait]
impl BlockSyncApi for GroupChain {
    async fn start_sync(&self) -> Result<(), SyncError> {
        let tip = self.ingestor.tip();
        self.controller.start(&tip.block_id).await
    }

    async fn start_backward(&self, block_id: &str) -> Result<(), SyncError> {
        self.controller.start_backward(block_id).await
    }

    async fn sync_local(&self) -> Result<usize, SyncError> {
        self.controller.sync_local().await
    }

    async fn stop_sync(&self) {
        self.controller.stop().await;
    }

    async fn handle_block_broadcast(&self, block: Block) -> Result<BroadcastOutcome, SyncError> {
        if block.group_id != self.group_id {
            return Err(BlockError::InvalidBlock {
                block_id: block.block_id,
                reason: InvalidReason::GroupMismatch,
            }
            .into());
        }
        if !self.producers.read().is_producer(&block.producer_pubkey) {
            return Err(SyncError::UntrustedProducer(hex::encode(block.producer_pubkey)));
        }

        let block_id = block.block_id.clone();
        match self.ingestor.add_block(block) {
            Ok(AddBlockOutcome::Committed { .. }) => Ok(BroadcastOutcome::Committed),
            Ok(AddBlockOutcome::AlreadySaved) => Ok(BroadcastOutcome::AlreadySaved),
            Err(BlockError::ParentNotExist { parent_id, .. }) => {
                let backward_started = if self.controller.status() == SyncerStatus::Idle {
                    match self.controller.start_backward(&block_id).await {
                        Ok(()) => true,
                        Err(e) => {
                            debug!(error = %e, "Backward sync not started");
                            false
                        }
                    }
                } else {
                    false
                };
                info!(%block_id, %parent_id, backward_started, "Broadcast block quarantined");
                Ok(BroadcastOutcome::Quarantined { backward_started })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_sync_envelope(&self, envelope: SyncEnvelope) -> Result<(), SyncError> {
        let msg = self.envelopes.open(&envelope)?;
        if msg.is_request() {
            self.responder.handle_request(&msg).await?;
            return Ok(());
        }

        let payload = match msg {
            SyncMessage::ReqBlockResp(resp) => {
                if resp.provider_pubkey != envelope.sender_pubkey {
                    return Err(SyncError::MalformedResponse("provider is not the sender".to_string()));
                }
                SyncPayload::Block(resp)
            }
            SyncMessage::ReqBlocksResp(resp) => {
                if resp.provider_pubkey != envelope.sender_pubkey {
                    return Err(SyncError::MalformedResponse("provider is not the sender".to_string()));
                }
                SyncPayload::Epoch(resp)
            }
            other => {
                warn!(msg_type = ?other.msg_type(), "Unexpected sync message");
                return Ok(());
            }
        };
        self.controller.add_result_to_queue(payload)
    }

    fn syncer_status(&self) -> SyncerStatus {
        self.controller.status()
    }

    fn chain_tip(&self) -> ChainTip {
        self.ingestor.tip()
    }
}
