//! Storage trait for planned tasks, recurring jobs, and reminders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::graph::GraphTask;
use crate::scheduler::{Reminder, RecurringJob};

/// Persistence boundary for everything durable in the engine.
///
/// Implementations must make [`claim_task`](TaskStore::claim_task) atomic:
/// a task moves from `todo` to `in_progress` for exactly one caller, no
/// matter how many executors race on it. Everything else is plain CRUD.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // ── Planned tasks ───────────────────────────────────────────────

    async fn create_task(&self, task: &GraphTask) -> Result<(), DatabaseError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<GraphTask>, DatabaseError>;

    /// Fetch the given tasks; ids with no row are silently absent from the
    /// result.
    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<GraphTask>, DatabaseError>;

    /// Tasks for an owner, most urgent first (lowest priority number),
    /// newest first within a priority.
    async fn list_tasks_for_owner(&self, owner_id: &str) -> Result<Vec<GraphTask>, DatabaseError>;

    /// Atomically move a `todo` task to `in_progress`. Returns `false` when
    /// the task is missing or no longer `todo` (someone else claimed it).
    async fn claim_task(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn complete_task(&self, id: Uuid, result: Value) -> Result<(), DatabaseError>;

    /// Terminal failure: status `cancelled` with the error recorded.
    async fn cancel_task(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    // ── Dependency edges ────────────────────────────────────────────

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> Result<(), DatabaseError>;

    async fn list_dependencies(&self, task_id: Uuid) -> Result<Vec<Uuid>, DatabaseError>;

    // ── Recurring jobs ──────────────────────────────────────────────

    async fn create_job(&self, job: &RecurringJob) -> Result<(), DatabaseError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<RecurringJob>, DatabaseError>;

    /// Look up one of the owner's jobs by UUID or by name.
    async fn find_job(
        &self,
        owner_id: &str,
        name_or_id: &str,
    ) -> Result<Option<RecurringJob>, DatabaseError>;

    async fn list_jobs(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> Result<Vec<RecurringJob>, DatabaseError>;

    /// All active jobs across owners, for the scheduler tick.
    async fn list_active_jobs(&self) -> Result<Vec<RecurringJob>, DatabaseError>;

    /// Advance `last_run_at`. Never moves it backward; a stale write from a
    /// delayed tick is dropped.
    async fn touch_job_last_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    async fn deactivate_job(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Reminders ───────────────────────────────────────────────────

    async fn create_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError>;

    /// Un-notified reminders with `due_at` inside `[from, to]`.
    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, DatabaseError>;

    async fn mark_reminder_notified(&self, id: Uuid) -> Result<(), DatabaseError>;
}
