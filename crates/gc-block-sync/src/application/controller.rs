//! # Sync Session Controller
//!
//! Owns the syncer status and one dispatcher per session.
//!
//! ```text
//! IDLE ──start──→ SYNCING_FORWARD ──not found──→ IDLE
//!   │                   ▲      └──retries exhausted──→ SYNC_FAILED
//!   │                   │ parent committed
//!   └─start_backward─→ SYNCING_BACKWARD
//! IDLE ──sync_local──→ LOCAL_SYNCING ──→ IDLE
//! any ──stop──→ CLOSED
//! ```
//!
//! A session is the lifetime of one dispatcher. Every request carries the
//! session id and the task id; responses for another session are refused
//! before they reach the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{BlockId, GroupId, ProducerPool, PublicKey};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::epoch::{handle_req_blocks_resp, EpochOutcome};
use super::response::{handle_req_block_resp, BlockRespOutcome, RespContext};
use crate::config::{SyncConfig, SyncVariant};
use crate::dispatcher::{DispatcherHandle, MsgHandler, TaskDispatcher, TaskGenerator, TaskSender};
use crate::domain::{
    BlockFetchMeta, Direction, EpochFetchMeta, SessionId, SyncError, SyncMsg, SyncTask,
    SyncerStatus, TaskId, TaskMeta,
};
use crate::ingest::BlockIngestor;
use crate::ports::{BlockStore, Channel, ConnectionManager, EnvelopeFactory};
use crate::protocol::{ReqBlock, ReqBlockResp, ReqBlocks, ReqBlocksResp, SyncMessage, SyncPayload};

type SessionDispatcher = TaskDispatcher<TaskMeta, SyncPayload>;
type SessionHandle = DispatcherHandle<TaskMeta, SyncPayload>;

/// Collaborators shared by the controller and the rest of the node.
#[derive(Clone)]
pub struct SessionDeps {
    /// Commit path.
    pub ingestor: Arc<BlockIngestor>,
    /// Block storage.
    pub store: Arc<dyn BlockStore>,
    /// Trusted producers; may change while running.
    pub producers: Arc<RwLock<ProducerPool>>,
    /// Outbound transport.
    pub conn: Arc<dyn ConnectionManager>,
    /// Envelope sealing.
    pub envelopes: Arc<dyn EnvelopeFactory>,
}

/// Where the next task starts.
#[derive(Clone, Debug)]
enum Cursor {
    Block { block_id: BlockId, direction: Direction },
    Epoch { next_height: u64 },
}

/// Session state shared with the dispatcher loops.
struct SessionCore {
    config: SyncConfig,
    group_id: GroupId,
    me: PublicKey,
    deps: SessionDeps,
    status: RwLock<SyncerStatus>,
    session_id: RwLock<Option<SessionId>>,
    cursor: Mutex<Cursor>,
    serial: AtomicU64,
}

/// Drives sync sessions for one group.
pub struct SyncSessionController {
    core: Arc<SessionCore>,
    dispatcher: Mutex<Option<Arc<SessionDispatcher>>>,
}

impl SyncSessionController {
    /// Create an idle controller.
    pub fn new(config: SyncConfig, group_id: impl Into<GroupId>, deps: SessionDeps) -> Self {
        let me = deps.envelopes.local_pubkey();
        Self {
            core: Arc::new(SessionCore {
                config,
                group_id: group_id.into(),
                me,
                deps,
                status: RwLock::new(SyncerStatus::Idle),
                session_id: RwLock::new(None),
                cursor: Mutex::new(Cursor::Block {
                    block_id: BlockId::new(),
                    direction: Direction::Next,
                }),
                serial: AtomicU64::new(0),
            }),
            dispatcher: Mutex::new(None),
        }
    }

    /// Current syncer status.
    pub fn status(&self) -> SyncerStatus {
        *self.core.status.read()
    }

    /// Id of the running (or last) session.
    pub fn session_id(&self) -> Option<SessionId> {
        *self.core.session_id.read()
    }

    /// Start a forward session from `from`.
    ///
    /// In the epoch variant the first batch starts right above `from`.
    pub async fn start(&self, from: &str) -> Result<(), SyncError> {
        self.begin_session(SyncerStatus::SyncingForward, |core| match core.config.variant {
            SyncVariant::SingleBlock => {
                core.set_cursor(from.to_string(), Direction::Next);
                Ok(core.get_block_task(from))
            }
            SyncVariant::EpochBatch => {
                let height = core
                    .deps
                    .store
                    .get_height(from)?
                    .ok_or_else(|| SyncError::BlockNotFound(from.to_string()))?;
                *core.cursor.lock() = Cursor::Epoch {
                    next_height: height + 1,
                };
                Ok(core.epoch_task(height + 1))
            }
        })
        .await
    }

    /// Start a backward session from the orphan `block_id`.
    pub async fn start_backward(&self, block_id: &str) -> Result<(), SyncError> {
        self.begin_session(SyncerStatus::SyncingBackward, |core| {
            core.set_cursor(block_id.to_string(), Direction::Previous);
            Ok(core.get_block_task(block_id))
        })
        .await
    }

    /// Commit every quarantined block whose parent is already committed.
    pub async fn sync_local(&self) -> Result<usize, SyncError> {
        self.core.claim(SyncerStatus::LocalSyncing)?;
        let result = self.core.deps.ingestor.promote_cached();
        self.core.leave_syncing(SyncerStatus::Idle);
        let promoted = result?;
        info!(group_id = %self.core.group_id, promoted, "Local sync finished");
        Ok(promoted)
    }

    /// Stop the running session, if any, and close the controller.
    pub async fn stop(&self) {
        *self.core.status.write() = SyncerStatus::Closed;
        self.retire_dispatcher().await;
        info!(group_id = %self.core.group_id, "Syncer closed");
    }

    /// Route a response into the running session.
    pub fn add_result_to_queue(&self, payload: SyncPayload) -> Result<(), SyncError> {
        let current = self.session_id();
        let handle = self
            .dispatcher
            .lock()
            .as_ref()
            .map(|d| d.handle())
            .filter(|h| !h.is_closed())
            .ok_or(SyncError::NotSyncing)?;
        if current != Some(payload.session_id()) {
            return Err(SyncError::UnknownSession {
                got: payload.session_id(),
            });
        }
        handle.add_msg(SyncMsg {
            task_id: payload.task_id(),
            payload,
        });
        Ok(())
    }

    /// Single-block task anchored at `block_id`; empty reuses the last anchor.
    pub fn get_block_task(&self, block_id: &str) -> SyncTask<TaskMeta> {
        self.core.get_block_task(block_id)
    }

    /// Flip a backward session to forward. Returns whether it flipped.
    pub fn swap_sync_direction(&self) -> bool {
        self.core.swap_sync_direction()
    }

    async fn begin_session<F>(&self, status: SyncerStatus, first_task: F) -> Result<(), SyncError>
    where
        F: FnOnce(&SessionCore) -> Result<SyncTask<TaskMeta>, SyncError>,
    {
        self.core.claim(status)?;
        self.retire_dispatcher().await;

        let first = match first_task(&self.core) {
            Ok(task) => task,
            Err(e) => {
                self.core.leave_syncing(SyncerStatus::Idle);
                return Err(e);
            }
        };

        let session_id = Uuid::new_v4();
        *self.core.session_id.write() = Some(session_id);

        let dispatcher = Arc::new(TaskDispatcher::new(
            self.core.config.dispatcher_config(),
            self.core.clone(),
            self.core.clone(),
            self.core.clone(),
        ));
        let handle = dispatcher.handle();
        *self.dispatcher.lock() = Some(dispatcher);

        info!(
            group_id = %self.core.group_id,
            %session_id,
            %status,
            meta = ?first.meta,
            "Sync session started"
        );
        handle.add_task(first);
        Ok(())
    }

    async fn retire_dispatcher(&self) {
        let old = self.dispatcher.lock().take();
        if let Some(dispatcher) = old {
            dispatcher.stop().await;
        }
    }
}

impl SessionCore {
    fn next_serial(&self) -> TaskId {
        self.serial.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn set_cursor(&self, block_id: BlockId, direction: Direction) {
        *self.cursor.lock() = Cursor::Block { block_id, direction };
    }

    /// Move to `to` if a new session may start now.
    fn claim(&self, to: SyncerStatus) -> Result<(), SyncError> {
        let mut status = self.status.write();
        if !status.can_start() {
            return Err(SyncError::AlreadySyncing(*status));
        }
        *status = to;
        Ok(())
    }

    /// End a session; a concurrent `stop` wins.
    fn leave_syncing(&self, to: SyncerStatus) {
        let mut status = self.status.write();
        if status.is_syncing() {
            *status = to;
        }
    }

    fn swap_sync_direction(&self) -> bool {
        let mut status = self.status.write();
        if *status == SyncerStatus::SyncingBackward {
            *status = SyncerStatus::SyncingForward;
            true
        } else {
            false
        }
    }

    fn get_block_task(&self, block_id: &str) -> SyncTask<TaskMeta> {
        let mut cursor = self.cursor.lock();
        let (block_id, direction) = match &*cursor {
            Cursor::Block {
                block_id: last,
                direction,
            } if block_id.is_empty() => (last.clone(), *direction),
            Cursor::Block { direction, .. } => (block_id.to_string(), *direction),
            Cursor::Epoch { .. } => (block_id.to_string(), Direction::Next),
        };
        *cursor = Cursor::Block {
            block_id: block_id.clone(),
            direction,
        };
        SyncTask::new(
            self.next_serial(),
            TaskMeta::Block(BlockFetchMeta { block_id, direction }),
        )
    }

    fn epoch_task(&self, from_height: u64) -> SyncTask<TaskMeta> {
        SyncTask::new(
            self.next_serial(),
            TaskMeta::Epoch(EpochFetchMeta {
                from_height,
                count: self.config.epoch_batch_size,
            }),
        )
    }

    fn block_known(&self, block_id: &str) -> Result<bool, SyncError> {
        let store = &self.deps.store;
        Ok(store.block_exists(block_id, false)? || store.block_exists(block_id, true)?)
    }

    fn finish_session(&self, task_id: TaskId, d: &SessionHandle) {
        d.current_task_done(task_id);
        self.leave_syncing(SyncerStatus::Idle);
        info!(group_id = %self.group_id, tip = ?self.deps.ingestor.tip(), "Sync session finished");
        d.shutdown();
    }

    fn on_block_resp(&self, task: &SyncTask<TaskMeta>, meta: &BlockFetchMeta, resp: &ReqBlockResp, d: &SessionHandle) {
        let outcome = {
            let producers = self.deps.producers.read();
            let ctx = RespContext {
                me: &self.me,
                producers: &producers,
                store: self.deps.store.as_ref(),
                ingestor: &self.deps.ingestor,
            };
            handle_req_block_resp(resp, meta, &ctx)
        };

        match outcome {
            Ok(BlockRespOutcome::SyncDone) => self.finish_session(task.id, d),
            Ok(BlockRespOutcome::Accepted { block_id, .. }) => {
                d.current_task_done(task.id);
                if self.swap_sync_direction() {
                    if let Err(e) = self.deps.ingestor.promote_cached() {
                        warn!(error = %e, "Promoting cached blocks failed");
                    }
                    let tip = self.deps.ingestor.tip();
                    info!(tip = %tip.block_id, height = tip.height, "Gap closed, syncing forward");
                    self.set_cursor(tip.block_id, Direction::Next);
                } else {
                    self.set_cursor(block_id, meta.direction);
                }
                d.next();
            }
            Ok(BlockRespOutcome::Quarantined(block)) => {
                d.current_task_done(task.id);
                debug!(block_id = %block.block_id, "Parent still missing, continuing");
                self.set_cursor(block.block_id, meta.direction);
                d.next();
            }
            Ok(BlockRespOutcome::Ignored(reason)) => {
                debug!(task_id = task.id, ?reason, "Response ignored");
            }
            Err(e @ SyncError::UntrustedProducer(_)) => {
                warn!(task_id = task.id, error = %e, "Rejected response");
            }
            Err(e) => {
                warn!(task_id = task.id, error = %e, "Response handling failed");
            }
        }
    }

    fn on_epoch_resp(&self, task: &SyncTask<TaskMeta>, meta: &EpochFetchMeta, resp: &ReqBlocksResp, d: &SessionHandle) {
        let outcome = {
            let producers = self.deps.producers.read();
            let ctx = RespContext {
                me: &self.me,
                producers: &producers,
                store: self.deps.store.as_ref(),
                ingestor: &self.deps.ingestor,
            };
            handle_req_blocks_resp(resp, meta, &ctx)
        };

        match outcome {
            Ok(EpochOutcome::SyncDone) | Ok(EpochOutcome::Applied { finished: true, .. }) => {
                self.finish_session(task.id, d)
            }
            Ok(EpochOutcome::Applied { applied: 0, quarantined, .. }) => {
                warn!(task_id = task.id, quarantined, "Batch committed nothing, awaiting retry");
            }
            Ok(EpochOutcome::Applied {
                applied,
                quarantined,
                next_height,
                ..
            }) => {
                d.current_task_done(task.id);
                debug!(applied, quarantined, next_height, "Batch applied");
                *self.cursor.lock() = Cursor::Epoch { next_height };
                d.next();
            }
            Ok(EpochOutcome::Ignored(reason)) => {
                debug!(task_id = task.id, ?reason, "Batch ignored");
            }
            Err(e) => {
                warn!(task_id = task.id, error = %e, "Batch handling failed");
            }
        }
    }
}

#[async_trait]
impl TaskSender<TaskMeta> for SessionCore {
    async fn send_task(&self, task: SyncTask<TaskMeta>) -> Result<(), SyncError> {
        let session_id = (*self.session_id.read()).ok_or(SyncError::NotSyncing)?;
        let msg = match &task.meta {
            TaskMeta::Block(meta) => {
                if !self.block_known(&meta.block_id)? {
                    return Err(SyncError::BlockNotFound(meta.block_id.clone()));
                }
                let req = ReqBlock {
                    group_id: self.group_id.clone(),
                    block_id: meta.block_id.clone(),
                    requester_pubkey: self.me,
                    session_id,
                    task_id: task.id,
                };
                match meta.direction {
                    Direction::Next => SyncMessage::ReqBlockForward(req),
                    Direction::Previous => SyncMessage::ReqBlockBackward(req),
                }
            }
            TaskMeta::Epoch(meta) => SyncMessage::ReqBlocks(ReqBlocks {
                group_id: self.group_id.clone(),
                from_height: meta.from_height,
                count: meta.count,
                requester_pubkey: self.me,
                session_id,
                task_id: task.id,
            }),
        };

        let envelope = self.deps.envelopes.seal(&msg)?;
        debug!(
            task_id = task.id,
            retry = task.retry_count,
            msg_type = ?msg.msg_type(),
            "Sending sync request"
        );
        self.deps
            .conn
            .send(envelope, Channel::Producer(self.group_id.clone()))
            .await
    }
}

impl MsgHandler<TaskMeta, SyncPayload> for SessionCore {
    fn handle_msg(&self, msg: SyncMsg<SyncPayload>, current: Option<SyncTask<TaskMeta>>, d: &SessionHandle) {
        let Some(task) = current else {
            debug!(task_id = msg.task_id, "No task in flight, dropping response");
            return;
        };
        if task.id != msg.task_id {
            debug!(got = msg.task_id, current = task.id, "Stale response");
            return;
        }

        match (&task.meta, &msg.payload) {
            (TaskMeta::Block(meta), SyncPayload::Block(resp)) => self.on_block_resp(&task, meta, resp, d),
            (TaskMeta::Epoch(meta), SyncPayload::Epoch(resp)) => self.on_epoch_resp(&task, meta, resp, d),
            _ => debug!(task_id = task.id, "Response kind does not match task"),
        }
    }

    fn on_retries_exhausted(&self, task: &SyncTask<TaskMeta>, d: &SessionHandle) {
        self.leave_syncing(SyncerStatus::SyncFailed);
        error!(
            group_id = %self.group_id,
            task_id = task.id,
            retries = task.retry_count,
            "Sync failed, no response from producers"
        );
        d.shutdown();
    }
}

impl TaskGenerator<TaskMeta> for SessionCore {
    fn next_task(&self) -> Option<SyncTask<TaskMeta>> {
        let next_height = match &*self.cursor.lock() {
            Cursor::Epoch { next_height } => Some(*next_height),
            Cursor::Block { .. } => None,
        };
        Some(match next_height {
            Some(height) => self.epoch_task(height),
            None => self.get_block_task(""),
        })
    }
}
