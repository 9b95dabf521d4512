//! Ad-hoc background task tracking.
//!
//! Fire-and-forget execution of a single unit of work with progress
//! reporting, ownership, cancellation, and completion notification.
//! Everything here is process-memory only and best-effort: tracked tasks do
//! not survive restart by design.

pub mod record;

pub use record::{ProgressEntry, TaskRecord, TaskStatus, TaskView};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::dispatch::{Notifier, NotifyEvent, TaskDispatch};
use crate::error::TaskError;

type TaskTable = Arc<RwLock<HashMap<String, TaskRecord>>>;

/// Handle passed into a dispatched unit of work.
///
/// Gives the unit progress reporting and the cancellation token. The unit
/// should check the token at safe points; the supervising routine also
/// observes it at the unit's next suspension point.
#[derive(Clone)]
pub struct TaskHandle {
    id: String,
    tasks: TaskTable,
    cancel: CancelToken,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.id
    }

    /// Append a timestamped progress line. No-op once the task is terminal.
    pub async fn add_progress(&self, message: impl Into<String>) {
        let message = message.into();
        info!(task_id = %self.id, "{message}");
        let mut tasks = self.tasks.write().await;
        if let Some(record) = tasks.get_mut(&self.id) {
            record.add_progress(message);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suspend until cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub async fn owner_id(&self) -> Option<String> {
        self.tasks
            .read()
            .await
            .get(&self.id)
            .map(|r| r.owner_id.clone())
    }

    pub async fn description(&self) -> Option<String> {
        self.tasks
            .read()
            .await
            .get(&self.id)
            .map(|r| r.description.clone())
    }

    /// The input parameters the task was started with.
    pub async fn parameters(&self) -> Value {
        self.tasks
            .read()
            .await
            .get(&self.id)
            .map(|r| r.parameters.clone())
            .unwrap_or(Value::Null)
    }
}

/// Manages long-running tasks with progress tracking.
///
/// Explicit service object — construct once at process start and pass by
/// reference. Records are owned exclusively by the tracker; callers receive
/// only ids and read views.
pub struct TaskTracker {
    tasks: TaskTable,
    /// owner_id -> task ids, insertion order.
    owner_index: Arc<RwLock<HashMap<String, Vec<String>>>>,
    /// Cancellation tokens for non-terminal tasks.
    cancels: Arc<RwLock<HashMap<String, CancelToken>>>,
    notifiers: Arc<RwLock<Vec<Arc<dyn Notifier>>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            owner_index: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(RwLock::new(HashMap::new())),
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a callback fired whenever a task reaches a terminal state.
    pub async fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers.write().await.push(notifier);
    }

    /// Start a long-running task.
    ///
    /// Registers a `Pending` record and launches the dispatch as an
    /// independent tokio task. Returns the fresh task id immediately — the
    /// caller polls `get`/`status` for the outcome and never sees dispatch
    /// errors directly.
    pub async fn start(
        &self,
        owner_id: impl Into<String>,
        session_id: impl Into<String>,
        description: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: Value,
        dispatch: Arc<dyn TaskDispatch>,
    ) -> String {
        let record = TaskRecord::new(owner_id, session_id, description, tool_name, parameters);
        let task_id = record.id.clone();
        let owner = record.owner_id.clone();
        let cancel = CancelToken::new();

        self.tasks.write().await.insert(task_id.clone(), record);
        self.owner_index
            .write()
            .await
            .entry(owner.clone())
            .or_default()
            .push(task_id.clone());
        self.cancels
            .write()
            .await
            .insert(task_id.clone(), cancel.clone());

        let tasks = self.tasks.clone();
        let cancels = self.cancels.clone();
        let notifiers = self.notifiers.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            supervise(tasks, cancels, notifiers, id, dispatch, cancel).await;
        });

        info!(task_id = %task_id, owner_id = %owner, "Started tracked task");
        task_id
    }

    /// Get a full record clone by id.
    pub async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Get a task's read view by id.
    pub async fn status(&self, task_id: &str) -> Option<TaskView> {
        self.tasks.read().await.get(task_id).map(|r| r.to_view())
    }

    /// All tasks for an owner, optionally filtered to non-terminal ones.
    pub async fn list_for_owner(&self, owner_id: &str, active_only: bool) -> Vec<TaskRecord> {
        let index = self.owner_index.read().await;
        let ids = match index.get(owner_id) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };
        drop(index);

        let tasks = self.tasks.read().await;
        ids.iter()
            .filter_map(|id| tasks.get(id))
            .filter(|r| !active_only || r.status.is_active())
            .cloned()
            .collect()
    }

    /// Request cooperative cancellation of a running task.
    ///
    /// The unit stops at its next suspension point — not instantly. A task
    /// that already reached a terminal state cannot be cancelled again.
    pub async fn cancel(&self, task_id: &str) -> Result<(), TaskError> {
        let status = self.tasks.read().await.get(task_id).map(|r| r.status);
        match status {
            None => Err(TaskError::NotFound {
                id: task_id.to_string(),
            }),
            Some(status) if status.is_terminal() => Err(TaskError::AlreadyTerminal {
                id: task_id.to_string(),
                status: status.to_string(),
            }),
            Some(_) => {
                if let Some(token) = self.cancels.read().await.get(task_id) {
                    token.cancel();
                }
                info!(task_id = %task_id, "Cancellation requested");
                Ok(())
            }
        }
    }

    /// Remove records whose completion timestamp is older than `max_age`.
    /// Returns the number of records removed.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::hours(24));

        let mut tasks = self.tasks.write().await;
        let to_remove: Vec<String> = tasks
            .values()
            .filter(|r| matches!(r.completed_at, Some(at) if at < cutoff))
            .map(|r| r.id.clone())
            .collect();

        let mut index = self.owner_index.write().await;
        let mut cancels = self.cancels.write().await;
        for id in &to_remove {
            if let Some(record) = tasks.remove(id) {
                if let Some(ids) = index.get_mut(&record.owner_id) {
                    ids.retain(|t| t != id);
                    if ids.is_empty() {
                        index.remove(&record.owner_id);
                    }
                }
            }
            cancels.remove(id);
        }
        drop(cancels);
        drop(index);
        drop(tasks);

        if !to_remove.is_empty() {
            info!(count = to_remove.len(), "Swept old completed tasks");
        }
        to_remove.len()
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Supervising routine for one tracked task.
///
/// The only place task status is mutated. Dispatch failures are contained
/// here: stored as state, never re-raised.
async fn supervise(
    tasks: TaskTable,
    cancels: Arc<RwLock<HashMap<String, CancelToken>>>,
    notifiers: Arc<RwLock<Vec<Arc<dyn Notifier>>>>,
    task_id: String,
    dispatch: Arc<dyn TaskDispatch>,
    cancel: CancelToken,
) {
    {
        let mut guard = tasks.write().await;
        let Some(record) = guard.get_mut(&task_id) else {
            return;
        };
        record.add_progress("Task started");
        record.status = TaskStatus::Running;
        record.started_at = Some(Utc::now());
    }

    let handle = TaskHandle {
        id: task_id.clone(),
        tasks: tasks.clone(),
        cancel: cancel.clone(),
    };

    // The select observes the token at the unit's next suspension point,
    // mirroring cooperative cancellation: the dispatch future is dropped,
    // never pre-empted mid-poll.
    let outcome = tokio::select! {
        result = dispatch.run(handle) => Some(result),
        () = cancel.cancelled() => None,
    };

    let finished = {
        let mut guard = tasks.write().await;
        let Some(record) = guard.get_mut(&task_id) else {
            return;
        };
        match outcome {
            Some(Ok(result)) => {
                debug!(task_id = %task_id, "Task completed");
                record.add_progress("Task completed successfully");
                record.status = TaskStatus::Completed;
                record.result = Some(result);
            }
            Some(Err(e)) => {
                let reason = e.to_string();
                error!(task_id = %task_id, error = %reason, "Task failed");
                record.add_progress(format!("Task failed: {reason}"));
                record.status = TaskStatus::Failed;
                record.error = Some(reason);
            }
            None => {
                info!(task_id = %task_id, "Task cancelled");
                record.add_progress("Task cancelled");
                record.status = TaskStatus::Cancelled;
            }
        }
        record.completed_at = Some(Utc::now());
        record.clone()
    };

    cancels.write().await.remove(&task_id);

    let event = NotifyEvent::TaskFinished(finished);
    let registered: Vec<Arc<dyn Notifier>> = notifiers.read().await.clone();
    for notifier in registered {
        if let Err(e) = notifier.notify(&event).await {
            error!(task_id = %task_id, error = %e, "Notification callback failed");
        }
    }
}

/// Spawn the periodic sweep background loop.
pub fn spawn_sweep_loop(
    tracker: Arc<TaskTracker>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        // Skip the immediate first tick
        tick.tick().await;
        loop {
            tick.tick().await;
            tracker.sweep(max_age).await;
        }
    })
}
