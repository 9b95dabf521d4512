//! Error types for the task engine.

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Tracked-task errors.
///
/// Failures *inside* a dispatched unit of work never surface here — they are
/// captured at the supervising boundary and stored on the record as status +
/// error string. This enum covers operations on the tracker itself.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: String },

    #[error("Task {id} is already {status}, cannot change state")]
    AlreadyTerminal { id: String, status: String },
}

/// Graph planning/execution errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph task {id} not found")]
    NotFound { id: Uuid },

    #[error("Invalid plan id: {0}")]
    InvalidPlanId(String),
}

/// Recurring-job errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Scheduled job '{0}' not found")]
    JobNotFound(String),
}

/// Store-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
