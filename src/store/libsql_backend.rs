//! libSQL backend — async `TaskStore` implementation.
//!
//! Supports local file and in-memory databases. All timestamps are stored
//! as RFC 3339 TEXT in UTC.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::graph::{GraphTask, GraphTaskStatus};
use crate::scheduler::{Reminder, RecurringJob};
use crate::store::migrations;
use crate::store::traits::TaskStore;

/// libSQL task store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_json(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or(Value::Null)
}

fn to_json(value: &Value) -> Result<String, DatabaseError> {
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::Serialization(format!("JSON encode failed: {e}")))
}

/// Map a libsql Row to a GraphTask.
///
/// Column order: 0:id, 1:owner_id, 2:title, 3:description, 4:assigned_agent,
/// 5:status, 6:priority, 7:payload, 8:result, 9:error, 10:created_at,
/// 11:updated_at, 12:completed_at
fn row_to_task(row: &libsql::Row) -> Result<GraphTask, libsql::Error> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(5)?;
    let payload_str: String = row.get(7)?;
    let result_str: Option<String> = row.get(8).ok();
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;
    let completed_str: Option<String> = row.get(12).ok();

    Ok(GraphTask {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        assigned_agent: row.get(4)?,
        status: status_str.parse().unwrap_or(GraphTaskStatus::Todo),
        priority: row.get(6)?,
        payload: parse_json(&payload_str),
        result: result_str.as_deref().map(parse_json),
        error: row.get(9).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
        completed_at: parse_optional_datetime(&completed_str),
    })
}

const TASK_COLUMNS: &str = "id, owner_id, title, description, assigned_agent, status, priority, \
     payload, result, error, created_at, updated_at, completed_at";

/// Map a libsql Row to a RecurringJob.
///
/// Column order: 0:id, 1:owner_id, 2:name, 3:cron_expr, 4:tool_name,
/// 5:parameters, 6:active, 7:created_at, 8:last_run_at
fn row_to_job(row: &libsql::Row) -> Result<RecurringJob, libsql::Error> {
    let id_str: String = row.get(0)?;
    let params_str: String = row.get(5)?;
    let active: i64 = row.get(6)?;
    let created_str: String = row.get(7)?;
    let last_run_str: Option<String> = row.get(8).ok();

    Ok(RecurringJob {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        owner_id: row.get(1)?,
        name: row.get(2)?,
        cron_expr: row.get(3)?,
        tool_name: row.get(4)?,
        parameters: parse_json(&params_str),
        active: active != 0,
        created_at: parse_datetime(&created_str),
        last_run_at: parse_optional_datetime(&last_run_str),
    })
}

const JOB_COLUMNS: &str =
    "id, owner_id, name, cron_expr, tool_name, parameters, active, created_at, last_run_at";

/// Map a libsql Row to a Reminder.
fn row_to_reminder(row: &libsql::Row) -> Result<Reminder, libsql::Error> {
    let id_str: String = row.get(0)?;
    let due_str: String = row.get(4)?;
    let notified: i64 = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Reminder {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        owner_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3).ok(),
        due_at: parse_datetime(&due_str),
        notified: notified != 0,
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl TaskStore for LibSqlStore {
    async fn create_task(&self, task: &GraphTask) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO graph_tasks (id, owner_id, title, description, assigned_agent, \
                 status, priority, payload, result, error, created_at, updated_at, completed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL, ?9, ?10, NULL)",
                params![
                    task.id.to_string(),
                    task.owner_id.clone(),
                    task.title.clone(),
                    task.description.clone(),
                    task.assigned_agent.clone(),
                    task.status.to_string(),
                    task.priority,
                    to_json(&task.payload)?,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_task: {e}")))?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<GraphTask>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM graph_tasks WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task row: {e}")))?
        {
            Some(row) => Ok(Some(
                row_to_task(&row).map_err(|e| DatabaseError::Query(format!("get_task map: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<GraphTask>, DatabaseError> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(*id).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn list_tasks_for_owner(&self, owner_id: &str) -> Result<Vec<GraphTask>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM graph_tasks WHERE owner_id = ?1 \
                     ORDER BY priority ASC, created_at DESC"
                ),
                params![owner_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks_for_owner: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks_for_owner row: {e}")))?
        {
            tasks.push(
                row_to_task(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_tasks_for_owner map: {e}")))?,
            );
        }
        Ok(tasks)
    }

    async fn claim_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        // The status guard in the WHERE clause makes this a compare-and-set:
        // concurrent claimers race on the row and exactly one update lands.
        let affected = self
            .conn()
            .execute(
                "UPDATE graph_tasks SET status = 'in_progress', updated_at = ?1 \
                 WHERE id = ?2 AND status = 'todo'",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_task: {e}")))?;
        Ok(affected == 1)
    }

    async fn complete_task(&self, id: Uuid, result: Value) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE graph_tasks SET status = 'done', result = ?1, updated_at = ?2, \
                 completed_at = ?2 WHERE id = ?3",
                params![to_json(&result)?, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_task: {e}")))?;
        Ok(())
    }

    async fn cancel_task(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE graph_tasks SET status = 'cancelled', error = ?1, updated_at = ?2, \
                 completed_at = ?2 WHERE id = ?3",
                params![error, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("cancel_task: {e}")))?;
        Ok(())
    }

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on) VALUES (?1, ?2)",
                params![task_id.to_string(), depends_on.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_dependency: {e}")))?;
        Ok(())
    }

    async fn list_dependencies(&self, task_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT depends_on FROM task_dependencies WHERE task_id = ?1",
                params![task_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_dependencies: {e}")))?;

        let mut deps = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_dependencies row: {e}")))?
        {
            let dep_str: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_dependencies map: {e}")))?;
            if let Ok(dep) = Uuid::parse_str(&dep_str) {
                deps.push(dep);
            }
        }
        Ok(deps)
    }

    async fn create_job(&self, job: &RecurringJob) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO recurring_jobs (id, owner_id, name, cron_expr, tool_name, \
                 parameters, active, created_at, last_run_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                params![
                    job.id.to_string(),
                    job.owner_id.clone(),
                    job.name.clone(),
                    job.cron_expr.clone(),
                    job.tool_name.clone(),
                    to_json(&job.parameters)?,
                    job.active as i64,
                    job.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_job: {e}")))?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<RecurringJob>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM recurring_jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_job: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_job row: {e}")))?
        {
            Some(row) => Ok(Some(
                row_to_job(&row).map_err(|e| DatabaseError::Query(format!("get_job map: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn find_job(
        &self,
        owner_id: &str,
        name_or_id: &str,
    ) -> Result<Option<RecurringJob>, DatabaseError> {
        if let Ok(id) = Uuid::parse_str(name_or_id) {
            if let Some(job) = self.get_job(id).await? {
                if job.owner_id == owner_id {
                    return Ok(Some(job));
                }
            }
        }

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM recurring_jobs \
                     WHERE owner_id = ?1 AND name = ?2 ORDER BY created_at DESC LIMIT 1"
                ),
                params![owner_id, name_or_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_job: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find_job row: {e}")))?
        {
            Some(row) => Ok(Some(
                row_to_job(&row).map_err(|e| DatabaseError::Query(format!("find_job map: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn list_jobs(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> Result<Vec<RecurringJob>, DatabaseError> {
        let sql = if active_only {
            format!(
                "SELECT {JOB_COLUMNS} FROM recurring_jobs \
                 WHERE owner_id = ?1 AND active = 1 ORDER BY created_at"
            )
        } else {
            format!(
                "SELECT {JOB_COLUMNS} FROM recurring_jobs WHERE owner_id = ?1 ORDER BY created_at"
            )
        };
        let mut rows = self
            .conn()
            .query(&sql, params![owner_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs row: {e}")))?
        {
            jobs.push(
                row_to_job(&row).map_err(|e| DatabaseError::Query(format!("list_jobs map: {e}")))?,
            );
        }
        Ok(jobs)
    }

    async fn list_active_jobs(&self) -> Result<Vec<RecurringJob>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM recurring_jobs WHERE active = 1 ORDER BY created_at"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_jobs: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_jobs row: {e}")))?
        {
            jobs.push(
                row_to_job(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_active_jobs map: {e}")))?,
            );
        }
        Ok(jobs)
    }

    async fn touch_job_last_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        // RFC 3339 UTC strings sort chronologically, so the guard keeps
        // last_run_at monotonic in SQL.
        self.conn()
            .execute(
                "UPDATE recurring_jobs SET last_run_at = ?1 \
                 WHERE id = ?2 AND (last_run_at IS NULL OR last_run_at < ?1)",
                params![at.to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("touch_job_last_run: {e}")))?;
        Ok(())
    }

    async fn deactivate_job(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE recurring_jobs SET active = 0 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("deactivate_job: {e}")))?;
        Ok(())
    }

    async fn create_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO reminders (id, owner_id, title, body, due_at, notified, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    reminder.id.to_string(),
                    reminder.owner_id.clone(),
                    reminder.title.clone(),
                    reminder.body.clone(),
                    reminder.due_at.to_rfc3339(),
                    reminder.notified as i64,
                    reminder.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_reminder: {e}")))?;
        Ok(())
    }

    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, owner_id, title, body, due_at, notified, created_at FROM reminders \
                 WHERE notified = 0 AND due_at >= ?1 AND due_at <= ?2 ORDER BY due_at",
                params![from.to_rfc3339(), to.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_due_reminders: {e}")))?;

        let mut reminders = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_due_reminders row: {e}")))?
        {
            reminders.push(
                row_to_reminder(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_due_reminders map: {e}")))?,
            );
        }
        Ok(reminders)
    }

    async fn mark_reminder_notified(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE reminders SET notified = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_reminder_notified: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn task_roundtrip() {
        let store = store().await;
        let task = GraphTask::new("u1", "research", "dig in", "researcher", json!({"k": "v"}));
        store.create_task(&task).await.unwrap();

        let got = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(got.id, task.id);
        assert_eq!(got.owner_id, "u1");
        assert_eq!(got.title, "research");
        assert_eq!(got.assigned_agent, "researcher");
        assert_eq!(got.status, GraphTaskStatus::Todo);
        assert_eq!(got.priority, 2);
        assert_eq!(got.payload, json!({"k": "v"}));
        assert!(got.result.is_none());
        assert!(got.completed_at.is_none());
    }

    #[tokio::test]
    async fn claim_task_is_exclusive() {
        let store = store().await;
        let task = GraphTask::new("u1", "a", "", "orchestrator", Value::Null);
        store.create_task(&task).await.unwrap();

        assert!(store.claim_task(task.id).await.unwrap());
        assert!(!store.claim_task(task.id).await.unwrap());

        let got = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(got.status, GraphTaskStatus::InProgress);
    }

    #[tokio::test]
    async fn complete_and_cancel_are_terminal() {
        let store = store().await;
        let a = GraphTask::new("u1", "a", "", "orchestrator", Value::Null);
        let b = GraphTask::new("u1", "b", "", "orchestrator", Value::Null);
        store.create_task(&a).await.unwrap();
        store.create_task(&b).await.unwrap();

        store.complete_task(a.id, json!("done")).await.unwrap();
        store.cancel_task(b.id, "upstream failed").await.unwrap();

        let a = store.get_task(a.id).await.unwrap().unwrap();
        assert_eq!(a.status, GraphTaskStatus::Done);
        assert_eq!(a.result, Some(json!("done")));

        let b = store.get_task(b.id).await.unwrap().unwrap();
        assert_eq!(b.status, GraphTaskStatus::Cancelled);
        assert_eq!(b.error.as_deref(), Some("upstream failed"));
        assert!(!store.claim_task(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn dependency_edges_roundtrip() {
        let store = store().await;
        let a = GraphTask::new("u1", "a", "", "orchestrator", Value::Null);
        let b = GraphTask::new("u1", "b", "", "orchestrator", Value::Null);
        store.create_task(&a).await.unwrap();
        store.create_task(&b).await.unwrap();

        store.add_dependency(b.id, a.id).await.unwrap();
        store.add_dependency(b.id, a.id).await.unwrap();

        assert_eq!(store.list_dependencies(b.id).await.unwrap(), vec![a.id]);
        assert!(store.list_dependencies(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_listing_orders_by_priority() {
        let store = store().await;
        let mut low = GraphTask::new("u1", "low", "", "orchestrator", Value::Null);
        low.priority = 3;
        let mut high = GraphTask::new("u1", "high", "", "orchestrator", Value::Null);
        high.priority = 1;
        let other = GraphTask::new("u2", "other", "", "orchestrator", Value::Null);
        store.create_task(&low).await.unwrap();
        store.create_task(&high).await.unwrap();
        store.create_task(&other).await.unwrap();

        let tasks = store.list_tasks_for_owner("u1").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "high");
        assert_eq!(tasks[1].title, "low");
    }

    #[tokio::test]
    async fn job_lifecycle() {
        let store = store().await;
        let job = RecurringJob::new("u1", "digest", "0 8 * * *", "send_digest", json!({}));
        store.create_job(&job).await.unwrap();

        let found = store.find_job("u1", "digest").await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        let found = store
            .find_job("u1", &job.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "digest");
        assert!(store.find_job("u2", "digest").await.unwrap().is_none());

        let now = Utc::now();
        store.touch_job_last_run(job.id, now).await.unwrap();
        let earlier = now - chrono::Duration::seconds(30);
        store.touch_job_last_run(job.id, earlier).await.unwrap();
        let got = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(got.last_run_at.unwrap().timestamp(), now.timestamp());

        store.deactivate_job(job.id).await.unwrap();
        assert!(store.list_active_jobs().await.unwrap().is_empty());
        assert_eq!(store.list_jobs("u1", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");

        let task = GraphTask::new("u1", "durable", "", "orchestrator", Value::Null);
        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.create_task(&task).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        let got = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(got.title, "durable");
    }

    #[tokio::test]
    async fn reminder_window_and_notified_flag() {
        let store = store().await;
        let now = Utc::now();
        let due = Reminder::new("u1", "due now", None, now);
        let later = Reminder::new("u1", "next week", None, now + chrono::Duration::days(7));
        store.create_reminder(&due).await.unwrap();
        store.create_reminder(&later).await.unwrap();

        let window = chrono::Duration::seconds(60);
        let found = store
            .list_due_reminders(now - window, now + window)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "due now");

        store.mark_reminder_notified(due.id).await.unwrap();
        let found = store
            .list_due_reminders(now - window, now + window)
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
