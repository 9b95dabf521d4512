//! Boundary traits for external collaborators.
//!
//! The core has no knowledge of what a unit of work *does*. Everything that
//! performs real work — tool execution, agent calls, plan generation,
//! user notification — lives behind one of these traits and is injected at
//! construction time. No string-based reflection: a capability is always
//! "something invokable" resolved by the caller before it reaches the core.

use async_trait::async_trait;
use serde_json::Value;

use crate::graph::GraphTask;
use crate::scheduler::{Reminder, RecurringJob};
use crate::tracker::{TaskHandle, TaskRecord};

/// Opaque error produced by a collaborator. Stored as the failing unit's
/// error string; never propagated past the supervising boundary.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// The "do the work" call for an ad-hoc tracked task.
///
/// The handle gives the unit progress reporting and the cancellation token;
/// the unit should check the token at safe points.
#[async_trait]
pub trait TaskDispatch: Send + Sync {
    async fn run(&self, handle: TaskHandle) -> Result<Value, DispatchError>;
}

/// Dispatches a single graph task to whatever agent is responsible for it.
#[async_trait]
pub trait AgentDispatch: Send + Sync {
    async fn execute(&self, task: &GraphTask) -> Result<Value, DispatchError>;
}

/// Invokes a recurring job's target action (tool name + parameters).
#[async_trait]
pub trait ActionDispatch: Send + Sync {
    async fn invoke(&self, job: &RecurringJob) -> Result<Value, DispatchError>;
}

/// Planning collaborator: turns an objective into raw model text expected to
/// contain a JSON array of proposed nodes
/// (`{id, title, description, agent, dependencies[]}`).
#[async_trait]
pub trait Planner: Send + Sync {
    async fn propose(&self, objective: &str) -> Result<String, DispatchError>;
}

/// Something worth telling the user about.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    /// A tracked task reached a terminal state.
    TaskFinished(TaskRecord),
    /// A recurring job fired successfully.
    JobFired { job: RecurringJob, result: Value },
    /// A one-shot reminder came due.
    ReminderDue(Reminder),
}

/// Best-effort notification sink. Errors are logged and swallowed by the
/// core; a failing notifier never blocks a task from going terminal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), DispatchError>;
}
