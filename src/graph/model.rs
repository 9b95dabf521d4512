//! Durable graph task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a graph task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphTaskStatus {
    /// Waiting for its dependencies (or for a claim).
    Todo,
    /// Claimed by an executor pass; dispatch in flight.
    InProgress,
    /// Dispatch succeeded; result stored.
    Done,
    /// Unrecoverable failure after retries, or manually cancelled.
    Cancelled,
}

impl GraphTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for GraphTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for GraphTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown graph task status: {other}")),
        }
    }
}

/// A durable, dependency-aware unit of work participating in a DAG.
///
/// Dependency edges live in the store as an adjacency structure
/// (task id → set of dependency ids), not on this struct. Graph tasks are
/// never deleted — terminal rows are kept for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTask {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    /// Tag naming the agent responsible for execution.
    pub assigned_agent: String,
    pub status: GraphTaskStatus,
    /// 1 = high, 2 = medium, 3 = low.
    pub priority: i64,
    /// Input arguments for the dispatch.
    pub payload: Value,
    /// Output stored on success.
    pub result: Option<Value>,
    /// Failure reason stored when the task is cancelled after retries.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GraphTask {
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        assigned_agent: impl Into<String>,
        payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: description.into(),
            assigned_agent: assigned_agent.into(),
            status: GraphTaskStatus::Todo,
            priority: 2,
            payload,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_parse_roundtrip() {
        for status in [
            GraphTaskStatus::Todo,
            GraphTaskStatus::InProgress,
            GraphTaskStatus::Done,
            GraphTaskStatus::Cancelled,
        ] {
            let parsed: GraphTaskStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(GraphTaskStatus::Done.is_terminal());
        assert!(GraphTaskStatus::Cancelled.is_terminal());
        assert!(!GraphTaskStatus::Todo.is_terminal());
        assert!(!GraphTaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn new_task_defaults() {
        let task = GraphTask::new("u1", "Research", "Find sources", "researcher", Value::Null);
        assert_eq!(task.status, GraphTaskStatus::Todo);
        assert_eq!(task.priority, 2);
        assert!(task.result.is_none());
        assert!(task.completed_at.is_none());
    }
}
