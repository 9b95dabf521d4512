//! In-memory `TaskStore` — HashMap-backed, for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::graph::{GraphTask, GraphTaskStatus};
use crate::scheduler::{Reminder, RecurringJob};
use crate::store::traits::TaskStore;

#[derive(Default)]
struct Inner {
    tasks: HashMap<Uuid, GraphTask>,
    /// task id -> ids it depends on
    dependencies: HashMap<Uuid, Vec<Uuid>>,
    jobs: HashMap<Uuid, RecurringJob>,
    reminders: HashMap<Uuid, Reminder>,
}

/// Non-durable store. The mutex is never held across an await, so the
/// blocking lock is safe inside async methods.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panicked test thread; propagating the
        // panic is the right call there.
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: &GraphTask) -> Result<(), DatabaseError> {
        self.lock().tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<GraphTask>, DatabaseError> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<GraphTask>, DatabaseError> {
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect())
    }

    async fn list_tasks_for_owner(&self, owner_id: &str) -> Result<Vec<GraphTask>, DatabaseError> {
        let inner = self.lock();
        let mut tasks: Vec<GraphTask> = inner
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(tasks)
    }

    async fn claim_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut inner = self.lock();
        match inner.tasks.get_mut(&id) {
            Some(task) if task.status == GraphTaskStatus::Todo => {
                task.status = GraphTaskStatus::InProgress;
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_task(&self, id: Uuid, result: Value) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let task = inner.tasks.get_mut(&id).ok_or(DatabaseError::NotFound {
            entity: "task".to_string(),
            id: id.to_string(),
        })?;
        let now = Utc::now();
        task.status = GraphTaskStatus::Done;
        task.result = Some(result);
        task.updated_at = now;
        task.completed_at = Some(now);
        Ok(())
    }

    async fn cancel_task(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let task = inner.tasks.get_mut(&id).ok_or(DatabaseError::NotFound {
            entity: "task".to_string(),
            id: id.to_string(),
        })?;
        let now = Utc::now();
        task.status = GraphTaskStatus::Cancelled;
        task.error = Some(error.to_string());
        task.updated_at = now;
        task.completed_at = Some(now);
        Ok(())
    }

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let deps = inner.dependencies.entry(task_id).or_default();
        if !deps.contains(&depends_on) {
            deps.push(depends_on);
        }
        Ok(())
    }

    async fn list_dependencies(&self, task_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        Ok(self
            .lock()
            .dependencies
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_job(&self, job: &RecurringJob) -> Result<(), DatabaseError> {
        self.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<RecurringJob>, DatabaseError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn find_job(
        &self,
        owner_id: &str,
        name_or_id: &str,
    ) -> Result<Option<RecurringJob>, DatabaseError> {
        let inner = self.lock();
        if let Ok(id) = Uuid::parse_str(name_or_id) {
            if let Some(job) = inner.jobs.get(&id) {
                if job.owner_id == owner_id {
                    return Ok(Some(job.clone()));
                }
            }
        }
        Ok(inner
            .jobs
            .values()
            .find(|j| j.owner_id == owner_id && j.name == name_or_id)
            .cloned())
    }

    async fn list_jobs(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> Result<Vec<RecurringJob>, DatabaseError> {
        let inner = self.lock();
        let mut jobs: Vec<RecurringJob> = inner
            .jobs
            .values()
            .filter(|j| j.owner_id == owner_id && (!active_only || j.active))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn list_active_jobs(&self) -> Result<Vec<RecurringJob>, DatabaseError> {
        let inner = self.lock();
        let mut jobs: Vec<RecurringJob> =
            inner.jobs.values().filter(|j| j.active).cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn touch_job_last_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&id).ok_or(DatabaseError::NotFound {
            entity: "job".to_string(),
            id: id.to_string(),
        })?;
        if job.last_run_at.is_none_or(|prev| at > prev) {
            job.last_run_at = Some(at);
        }
        Ok(())
    }

    async fn deactivate_job(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&id).ok_or(DatabaseError::NotFound {
            entity: "job".to_string(),
            id: id.to_string(),
        })?;
        job.active = false;
        Ok(())
    }

    async fn create_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError> {
        self.lock().reminders.insert(reminder.id, reminder.clone());
        Ok(())
    }

    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, DatabaseError> {
        let inner = self.lock();
        let mut due: Vec<Reminder> = inner
            .reminders
            .values()
            .filter(|r| !r.notified && r.due_at >= from && r.due_at <= to)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        Ok(due)
    }

    async fn mark_reminder_notified(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let reminder = inner.reminders.get_mut(&id).ok_or(DatabaseError::NotFound {
            entity: "reminder".to_string(),
            id: id.to_string(),
        })?;
        reminder.notified = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(owner: &str, title: &str) -> GraphTask {
        GraphTask::new(owner, title, "", "orchestrator", Value::Null)
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let store = MemoryStore::new();
        let t = task("u1", "a");
        store.create_task(&t).await.unwrap();

        assert!(store.claim_task(t.id).await.unwrap());
        assert!(!store.claim_task(t.id).await.unwrap());
    }

    #[tokio::test]
    async fn claim_missing_task_is_false() {
        let store = MemoryStore::new();
        assert!(!store.claim_task(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn complete_sets_terminal_fields() {
        let store = MemoryStore::new();
        let t = task("u1", "a");
        store.create_task(&t).await.unwrap();
        store.claim_task(t.id).await.unwrap();
        store.complete_task(t.id, json!({"out": 1})).await.unwrap();

        let got = store.get_task(t.id).await.unwrap().unwrap();
        assert_eq!(got.status, GraphTaskStatus::Done);
        assert_eq!(got.result, Some(json!({"out": 1})));
        assert!(got.completed_at.is_some());
    }

    #[tokio::test]
    async fn dependencies_deduplicate() {
        let store = MemoryStore::new();
        let a = task("u1", "a");
        let b = task("u1", "b");
        store.create_task(&a).await.unwrap();
        store.create_task(&b).await.unwrap();

        store.add_dependency(b.id, a.id).await.unwrap();
        store.add_dependency(b.id, a.id).await.unwrap();
        assert_eq!(store.list_dependencies(b.id).await.unwrap(), vec![a.id]);
        assert!(store.list_dependencies(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_run_never_moves_backward() {
        let store = MemoryStore::new();
        let job = RecurringJob::new("u1", "j", "* * * * *", "noop", Value::Null);
        store.create_job(&job).await.unwrap();

        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);
        store.touch_job_last_run(job.id, later).await.unwrap();
        store.touch_job_last_run(job.id, earlier).await.unwrap();

        let got = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(got.last_run_at, Some(later));
    }

    #[tokio::test]
    async fn due_reminder_window_excludes_notified() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let r = Reminder::new("u1", "soon", None, now);
        store.create_reminder(&r).await.unwrap();

        let window = chrono::Duration::seconds(60);
        let due = store.list_due_reminders(now - window, now + window).await.unwrap();
        assert_eq!(due.len(), 1);

        store.mark_reminder_notified(r.id).await.unwrap();
        let due = store.list_due_reminders(now - window, now + window).await.unwrap();
        assert!(due.is_empty());
    }
}
