//! # Task Dispatcher
//!
//! Turns an unreliable request/response exchange into a serialized,
//! timeout-retried protocol.
//!
//! ```text
//!  add_task ──spawn──→ [task queue, cap 1] ──→ task loop ──spawn──→ TaskSender
//!                                                 │  ▲
//!                               current (watch) ──┘  └── done ids / timeout
//!                                    │
//!  add_msg ──try_send──→ [msg queue, bounded] ──→ msg loop ──→ MsgHandler
//! ```
//!
//! The task loop owns the current task and publishes it read-only through a
//! `watch` channel. Exactly one task is in flight: the loop waits for a
//! matching `current_task_done` or the timeout before taking the next one.
//! On timeout the same task (same id and meta) is resent. Sender errors are
//! only logged; the timeout is the sole retry trigger.
//!
//! `current_task_done` takes effect for the message side at once: the
//! acknowledged id is hidden from `current_task` before the task loop wakes,
//! so a duplicate response queued behind the first one sees no task.
//!
//! Shutdown is a `watch<bool>` observed by both loops, so closing never
//! races with concurrent `add_task`/`add_msg` calls.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::DispatcherConfig;
use crate::domain::{SyncError, SyncMsg, SyncTask, TaskId};

/// Performs the side-effecting send of a task.
#[async_trait]
pub trait TaskSender<M>: Send + Sync {
    /// Send the request for `task`. Errors are logged, never retried directly.
    async fn send_task(&self, task: SyncTask<M>) -> Result<(), SyncError>;
}

/// Interprets inbound responses.
///
/// Runs on the message loop, one message at a time. Implementations decide
/// whether the message satisfies `current` and call
/// [`DispatcherHandle::current_task_done`] and [`DispatcherHandle::next`].
pub trait MsgHandler<M, P>: Send + Sync {
    /// Handle one response.
    fn handle_msg(&self, msg: SyncMsg<P>, current: Option<SyncTask<M>>, dispatcher: &DispatcherHandle<M, P>);

    /// Called on the task loop once `task` timed out more than `max_retries` times.
    fn on_retries_exhausted(&self, task: &SyncTask<M>, dispatcher: &DispatcherHandle<M, P>);
}

/// Produces the next task of a session.
pub trait TaskGenerator<M>: Send + Sync {
    /// Next task, or `None` when there is nothing left to ask for.
    fn next_task(&self) -> Option<SyncTask<M>>;
}

/// Lifecycle of a dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherStatus {
    /// Accepting tasks and messages.
    Running,
    /// Shut down; every call is a no-op.
    Closed,
}

/// Cheap, cloneable handle for feeding a dispatcher.
pub struct DispatcherHandle<M, P> {
    task_tx: mpsc::Sender<SyncTask<M>>,
    msg_tx: mpsc::Sender<SyncMsg<P>>,
    done_tx: mpsc::UnboundedSender<TaskId>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    current_rx: watch::Receiver<Option<SyncTask<M>>>,
    acked: Arc<Mutex<Option<TaskId>>>,
    generator: Arc<dyn TaskGenerator<M>>,
}

impl<M, P> Clone for DispatcherHandle<M, P> {
    fn clone(&self) -> Self {
        Self {
            task_tx: self.task_tx.clone(),
            msg_tx: self.msg_tx.clone(),
            done_tx: self.done_tx.clone(),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            current_rx: self.current_rx.clone(),
            acked: Arc::clone(&self.acked),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<M, P> DispatcherHandle<M, P>
where
    M: Clone + Debug + Send + Sync + 'static,
    P: Send + 'static,
{
    /// Enqueue a task. Never blocks the caller; no-op once closed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add_task(&self, task: SyncTask<M>) {
        if self.is_closed() {
            debug!(task_id = task.id, "Dispatcher closed, task dropped");
            return;
        }
        let tx = self.task_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_shutdown(&mut shutdown_rx) => {}
                res = tx.send(task) => {
                    if res.is_err() {
                        debug!("Task queue closed");
                    }
                }
            }
        });
    }

    /// Enqueue an inbound response. Never blocks; drops when the queue is full.
    pub fn add_msg(&self, msg: SyncMsg<P>) {
        if self.is_closed() {
            return;
        }
        match self.msg_tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(task_id = msg.task_id, "Message queue full, response dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Message queue closed");
            }
        }
    }

    /// Generate and enqueue the next task of the session.
    pub fn next(&self) {
        match self.generator.next_task() {
            Some(task) => self.add_task(task),
            None => debug!("No next task"),
        }
    }

    /// Mark `task_id` as done. Ids other than the current task are ignored;
    /// repeated calls for the same task are no-ops.
    pub fn current_task_done(&self, task_id: TaskId) {
        {
            let current = self.current_rx.borrow();
            let mut acked = self.acked.lock();
            match current.as_ref() {
                Some(task) if task.id == task_id && *acked != Some(task_id) => *acked = Some(task_id),
                _ => return,
            }
        }
        let _ = self.done_tx.send(task_id);
    }

    /// Task currently in flight and not yet acknowledged.
    pub fn current_task(&self) -> Option<SyncTask<M>> {
        let acked = *self.acked.lock();
        self.current_rx.borrow().clone().filter(|task| Some(task.id) != acked)
    }

    /// Signal both loops to exit. Non-blocking; safe from inside a handler.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Whether shutdown was signalled.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Lifecycle state.
    pub fn status(&self) -> DispatcherStatus {
        if self.is_closed() {
            DispatcherStatus::Closed
        } else {
            DispatcherStatus::Running
        }
    }
}

/// Resolves once shutdown is signalled or every sender is gone.
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Generic retry-driven task/result dispatcher.
pub struct TaskDispatcher<M, P> {
    handle: DispatcherHandle<M, P>,
    loops: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl<M, P> TaskDispatcher<M, P>
where
    M: Clone + Debug + Send + Sync + 'static,
    P: Send + 'static,
{
    /// Spawn the task and message loops.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: DispatcherConfig,
        sender: Arc<dyn TaskSender<M>>,
        handler: Arc<dyn MsgHandler<M, P>>,
        generator: Arc<dyn TaskGenerator<M>>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::channel(1);
        let (msg_tx, msg_rx) = mpsc::channel(config.msg_queue_depth.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let (current_tx, current_rx) = watch::channel(None);

        let handle = DispatcherHandle {
            task_tx,
            msg_tx,
            done_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            current_rx,
            acked: Arc::new(Mutex::new(None)),
            generator,
        };

        let task_loop = TaskLoop {
            config,
            task_rx,
            done_rx,
            current_tx,
            shutdown_rx: handle.shutdown_tx.subscribe(),
            sender,
            handler: Arc::clone(&handler),
            handle: handle.clone(),
        };
        let msg_loop = MsgLoop {
            msg_rx,
            shutdown_rx: handle.shutdown_tx.subscribe(),
            handler,
            handle: handle.clone(),
        };

        let task_join = tokio::spawn(task_loop.run());
        let msg_join = tokio::spawn(msg_loop.run());

        Self {
            handle,
            loops: Mutex::new(Some((task_join, msg_join))),
        }
    }

    /// Handle for feeding this dispatcher.
    pub fn handle(&self) -> DispatcherHandle<M, P> {
        self.handle.clone()
    }

    /// Signal shutdown and wait for both loops to exit.
    ///
    /// Safe to call more than once and concurrently with `add_task`/`add_msg`.
    /// Must not be awaited from inside a handler; use
    /// [`DispatcherHandle::shutdown`] there.
    pub async fn stop(&self) {
        self.handle.shutdown();
        let loops = self.loops.lock().take();
        if let Some((task_join, msg_join)) = loops {
            if let Err(e) = task_join.await {
                error!("Task loop panicked: {}", e);
            }
            if let Err(e) = msg_join.await {
                error!("Message loop panicked: {}", e);
            }
            debug!("Dispatcher stopped");
        }
    }

    /// Lifecycle state.
    pub fn status(&self) -> DispatcherStatus {
        self.handle.status()
    }
}

enum TaskExit {
    Done,
    TimedOut,
    Shutdown,
}

struct TaskLoop<M, P> {
    config: DispatcherConfig,
    task_rx: mpsc::Receiver<SyncTask<M>>,
    done_rx: mpsc::UnboundedReceiver<TaskId>,
    current_tx: watch::Sender<Option<SyncTask<M>>>,
    shutdown_rx: watch::Receiver<bool>,
    sender: Arc<dyn TaskSender<M>>,
    handler: Arc<dyn MsgHandler<M, P>>,
    handle: DispatcherHandle<M, P>,
}

impl<M, P> TaskLoop<M, P>
where
    M: Clone + Debug + Send + Sync + 'static,
    P: Send + 'static,
{
    async fn run(mut self) {
        loop {
            let task = tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown_rx) => break,
                task = self.task_rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let mut task = task;
            loop {
                match self.execute(&task).await {
                    TaskExit::Done => break,
                    TaskExit::Shutdown => {
                        self.current_tx.send_replace(None);
                        debug!("Task loop exiting");
                        return;
                    }
                    TaskExit::TimedOut => {
                        let exhausted = self
                            .config
                            .max_retries
                            .is_some_and(|max| task.retry_count >= max);
                        if exhausted {
                            error!(task_id = task.id, retries = task.retry_count, meta = ?task.meta, "Task retries exhausted");
                            self.current_tx.send_replace(None);
                            self.handler.on_retries_exhausted(&task, &self.handle);
                            break;
                        }
                        task = task.retried();
                        debug!(task_id = task.id, retry = task.retry_count, "Task timed out, resending");
                    }
                }
            }
        }
        self.current_tx.send_replace(None);
        debug!("Task loop exiting");
    }

    async fn execute(&mut self, task: &SyncTask<M>) -> TaskExit {
        self.current_tx.send_replace(Some(task.clone()));

        let sender = Arc::clone(&self.sender);
        let outgoing = task.clone();
        tokio::spawn(async move {
            let task_id = outgoing.id;
            if let Err(e) = sender.send_task(outgoing).await {
                warn!(task_id, "Task send failed: {}", e);
            }
        });

        let deadline = tokio::time::sleep(self.config.task_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown_rx) => return TaskExit::Shutdown,
                done = self.done_rx.recv() => match done {
                    Some(id) if id == task.id => {
                        self.current_tx.send_replace(None);
                        return TaskExit::Done;
                    }
                    Some(stale) => debug!(task_id = stale, current = task.id, "Ignoring stale done signal"),
                    None => return TaskExit::Shutdown,
                },
                _ = &mut deadline => return TaskExit::TimedOut,
            }
        }
    }
}

struct MsgLoop<M, P> {
    msg_rx: mpsc::Receiver<SyncMsg<P>>,
    shutdown_rx: watch::Receiver<bool>,
    handler: Arc<dyn MsgHandler<M, P>>,
    handle: DispatcherHandle<M, P>,
}

impl<M, P> MsgLoop<M, P>
where
    M: Clone + Debug + Send + Sync + 'static,
    P: Send + 'static,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown_rx) => break,
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => {
                        let current = self.handle.current_task();
                        self.handler.handle_msg(msg, current, &self.handle);
                    }
                    None => break,
                },
            }
        }
        debug!("Message loop exiting");
    }
}
