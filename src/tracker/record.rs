//! Tracked-task record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution status of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Registered, dispatch not yet started.
    Pending,
    /// Dispatch is executing.
    Running,
    /// Dispatch returned a result.
    Completed,
    /// Dispatch raised; error is stored on the record.
    Failed,
    /// Cancellation was requested and honored.
    Cancelled,
}

impl TaskStatus {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One timestamped progress line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// In-memory record of one ad-hoc tracked unit of work.
///
/// Owned exclusively by the `TaskTracker`; callers only ever receive clones
/// and views. Not persisted — tracked tasks do not survive restart.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// Opaque short token (8 hex chars).
    pub id: String,
    pub owner_id: String,
    pub session_id: String,
    pub description: String,
    /// Name of the tool/capability being executed, for display only.
    pub tool_name: String,
    pub parameters: Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered progress log, appended only while not terminal.
    pub progress: Vec<ProgressEntry>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(
        owner_id: impl Into<String>,
        session_id: impl Into<String>,
        description: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            id: short_id(),
            owner_id: owner_id.into(),
            session_id: session_id.into(),
            description: description.into(),
            tool_name: tool_name.into(),
            parameters,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// Append a progress line. No-op once terminal.
    pub(crate) fn add_progress(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.progress.push(ProgressEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Summary view for status queries (`has_result` instead of the payload).
    pub fn to_view(&self) -> TaskView {
        TaskView {
            task_id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            session_id: self.session_id.clone(),
            description: self.description.clone(),
            tool_name: self.tool_name.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            progress: self.progress.clone(),
            has_result: self.result.is_some(),
            error: self.error.clone(),
        }
    }
}

/// Read view of a tracked task, safe to hand to any caller.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: String,
    pub owner_id: String,
    pub session_id: String,
    pub description: String,
    pub tool_name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Vec<ProgressEntry>,
    pub has_result: bool,
    pub error: Option<String>,
}

/// Generate an opaque short task id (first 8 hex chars of a v4 UUID).
fn short_id() -> String {
    let full = Uuid::new_v4().simple().to_string();
    full[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn short_id_length() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn progress_refused_after_terminal() {
        let mut record = TaskRecord::new("u", "s", "test", "noop", Value::Null);
        record.add_progress("one");
        record.status = TaskStatus::Completed;
        record.add_progress("two");
        assert_eq!(record.progress.len(), 1);
        assert_eq!(record.progress[0].message, "one");
    }

    #[test]
    fn view_hides_result_payload() {
        let mut record = TaskRecord::new("u", "s", "test", "noop", Value::Null);
        record.result = Some(serde_json::json!({"secret": true}));
        let view = record.to_view();
        assert!(view.has_result);
    }

    #[test]
    fn status_serde_roundtrip() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskStatus::Running);
    }
}
