//! In-process priority task queue (§4.7). Generalizes the teacher's ad-hoc
//! `tokio::spawn` call sites in the memory create path into a supervised
//! queue: handlers are registered by name, a fixed worker pool dequeues in
//! priority order, and failures are retried up to `max_attempts` before being
//! dropped with a logged reason.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, Semaphore};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub name: String,
    pub priority: TaskPriority,
    pub payload: Value,
    pub submitted_at: DateTime<Utc>,
    pub attempts: u32,
}

impl Task {
    pub fn new(name: impl Into<String>, priority: TaskPriority, payload: Value) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: name.clone(),
            name,
            priority,
            payload,
            submitted_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Partition key used to serialize same-memory writes on a single
    /// handler invocation at a time (§4.7's embedding-column writer
    /// ordering guarantee). Absent a `memory_id` field, tasks run unordered.
    fn partition_key(&self) -> Option<String> {
        self.payload.get("memory_id").and_then(Value::as_str).map(str::to_owned)
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type Handler = Arc<dyn Fn(Task) -> HandlerFuture + Send + Sync>;

pub struct DequeuedReceivers {
    high: mpsc::UnboundedReceiver<Task>,
    normal: mpsc::UnboundedReceiver<Task>,
    low: mpsc::UnboundedReceiver<Task>,
}

/// Supervised in-process priority queue. Cloning shares the same intake
/// channels, handler registry, and in-flight permit pool.
#[derive(Clone)]
pub struct TaskQueue {
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
    high_tx: mpsc::UnboundedSender<Task>,
    normal_tx: mpsc::UnboundedSender<Task>,
    low_tx: mpsc::UnboundedSender<Task>,
    partition_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    config: QueueConfig,
    inflight: Arc<Semaphore>,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> (Self, DequeuedReceivers) {
        let (high_tx, high) = mpsc::unbounded_channel();
        let (normal_tx, normal) = mpsc::unbounded_channel();
        let (low_tx, low) = mpsc::unbounded_channel();

        let queue = Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            high_tx,
            normal_tx,
            low_tx,
            partition_locks: Arc::new(Mutex::new(HashMap::new())),
            inflight: Arc::new(Semaphore::new(config.workers.max(1))),
            config,
        };

        (queue, DequeuedReceivers { high, normal, low })
    }

    /// Registers a named handler. Re-registering a name overwrites it.
    pub async fn register(&self, name: impl Into<String>, handler: Handler) {
        self.handlers.lock().await.insert(name.into(), handler);
    }

    pub fn submit(&self, task: Task) -> Result<()> {
        let tx = match task.priority {
            TaskPriority::High => &self.high_tx,
            TaskPriority::Normal => &self.normal_tx,
            TaskPriority::Low => &self.low_tx,
        };
        tx.send(task).map_err(|_| CoreError::Internal("task queue closed".into()))
    }

    /// Spawns the worker loop. Dequeues in strict priority order (HIGH before
    /// NORMAL before LOW), FIFO within a priority, bounded parallelism via
    /// `config.workers`. Returns a shutdown handle.
    pub fn spawn_workers(&self, mut rx: DequeuedReceivers) -> ShutdownHandle {
        let handlers = self.handlers.clone();
        let partition_locks = self.partition_locks.clone();
        let max_attempts = self.config.max_attempts;
        let inflight = self.inflight.clone();

        let join = tokio::spawn(async move {
            loop {
                let task = tokio::select! {
                    biased;
                    Some(t) = rx.high.recv() => Some(t),
                    Some(t) = rx.normal.recv() => Some(t),
                    Some(t) = rx.low.recv() => Some(t),
                    else => None,
                };

                let Some(mut task) = task else { break };

                let Ok(permit) = inflight.clone().acquire_owned().await else { break };
                let handlers = handlers.clone();
                let partition_locks = partition_locks.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let lock = if let Some(key) = task.partition_key() {
                        let mut locks = partition_locks.lock().await;
                        Some(locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone())
                    } else {
                        None
                    };
                    let _guard = match &lock {
                        Some(l) => Some(l.lock().await),
                        None => None,
                    };

                    let handler = { handlers.lock().await.get(&task.name).cloned() };
                    let Some(handler) = handler else {
                        tracing::warn!(task = %task.name, "no handler registered, dropping task");
                        return;
                    };

                    loop {
                        match handler(task.clone()).await {
                            Ok(()) => break,
                            Err(e) => {
                                task.attempts += 1;
                                if task.attempts >= max_attempts {
                                    tracing::warn!(
                                        task_id = %task.id,
                                        task = %task.name,
                                        attempts = task.attempts,
                                        error = %e,
                                        "task exceeded max_attempts, dropping"
                                    );
                                    break;
                                }
                                tracing::debug!(task_id = %task.id, attempts = task.attempts, error = %e, "task failed, retrying");
                            }
                        }
                    }
                });
            }
        });

        ShutdownHandle { join, drain: Duration::from_secs(self.config.shutdown_drain_secs) }
    }
}

pub struct ShutdownHandle {
    join: tokio::task::JoinHandle<()>,
    drain: Duration,
}

impl ShutdownHandle {
    /// Waits up to `shutdown_drain_secs` for the worker loop to finish; the
    /// loop exits once every intake channel is closed and drained.
    pub async fn shutdown(self) {
        let _ = tokio::time::timeout(self.drain, self.join).await;
    }
}
