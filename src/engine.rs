//! Top-level engine facade wiring the tracker, planner, executor, and
//! scheduler around one store and one config.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dispatch::{ActionDispatch, AgentDispatch, Notifier, Planner, TaskDispatch};
use crate::error::{GraphError, Result, TaskError};
use crate::graph::{GraphExecutor, GraphPlanner, RunOutcome};
use crate::scheduler::{Reminder, RecurringJob, RecurringScheduler};
use crate::store::TaskStore;
use crate::tracker::{TaskRecord, TaskTracker, TaskView};

/// Everything the engine can do, behind one object.
///
/// All collaborators are injected: the store decides durability, the
/// dispatch traits decide what "executing" means. The engine owns only the
/// orchestration.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn TaskStore>,
    tracker: Arc<TaskTracker>,
    planner: GraphPlanner,
    executor: GraphExecutor,
    scheduler: Arc<RecurringScheduler>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TaskStore>,
        planner: Arc<dyn Planner>,
        agent: Arc<dyn AgentDispatch>,
        action: Arc<dyn ActionDispatch>,
    ) -> Self {
        Self {
            tracker: Arc::new(TaskTracker::new()),
            planner: GraphPlanner::new(store.clone(), planner),
            executor: GraphExecutor::new(store.clone(), agent, config.clone()),
            scheduler: Arc::new(RecurringScheduler::new(
                store.clone(),
                action,
                config.clone(),
            )),
            config,
            store,
        }
    }

    /// Subscribe to task completions, job firings, and due reminders.
    pub async fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.tracker.register_notifier(notifier.clone()).await;
        self.scheduler.register_notifier(notifier).await;
    }

    // ── Planning and parallel execution ─────────────────────────────

    /// Break an objective into persisted tasks. Returns an opaque plan id
    /// (the task ids, comma-joined) for [`run_plan`](Engine::run_plan);
    /// empty when planning produced nothing usable.
    pub async fn create_plan(&self, objective: &str, owner_id: &str) -> Result<String> {
        let ids = self.planner.plan(objective, owner_id).await?;
        Ok(ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Execute a plan to completion or stall.
    pub async fn run_plan(&self, plan_id: &str) -> Result<RunOutcome> {
        let mut ids = Vec::new();
        for part in plan_id.split(',').filter(|p| !p.is_empty()) {
            let id = Uuid::parse_str(part)
                .map_err(|_| GraphError::InvalidPlanId(plan_id.to_string()))?;
            ids.push(id);
        }

        // Every referenced task must exist before the executor starts; a
        // stale or foreign id is a caller error, not a stall.
        let known: Vec<Uuid> = self
            .store
            .get_tasks(&ids)
            .await?
            .iter()
            .map(|t| t.id)
            .collect();
        if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(GraphError::NotFound { id: *missing }.into());
        }

        info!(tasks = ids.len(), "Running plan");
        self.executor.run(&ids).await
    }

    // ── Background tasks ────────────────────────────────────────────

    /// Fire off a background task; returns its id immediately.
    pub async fn start_task(
        &self,
        owner_id: &str,
        session_id: &str,
        description: &str,
        tool_name: &str,
        parameters: Value,
        dispatch: Arc<dyn TaskDispatch>,
    ) -> String {
        self.tracker
            .start(owner_id, session_id, description, tool_name, parameters, dispatch)
            .await
    }

    pub async fn task_status(&self, task_id: &str) -> Option<TaskView> {
        self.tracker.status(task_id).await
    }

    pub async fn list_tasks(&self, owner_id: &str, active_only: bool) -> Vec<TaskRecord> {
        self.tracker.list_for_owner(owner_id, active_only).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> std::result::Result<(), TaskError> {
        self.tracker.cancel(task_id).await
    }

    // ── Recurring jobs and reminders ────────────────────────────────

    pub async fn schedule(
        &self,
        owner_id: &str,
        name: &str,
        cron_expr: &str,
        tool_name: &str,
        parameters: Value,
    ) -> Result<RecurringJob> {
        self.scheduler
            .schedule(owner_id, name, cron_expr, tool_name, parameters)
            .await
    }

    pub async fn list_jobs(&self, owner_id: &str) -> Result<Vec<RecurringJob>> {
        self.scheduler.list_jobs(owner_id).await
    }

    pub async fn cancel_job(&self, owner_id: &str, name_or_id: &str) -> Result<RecurringJob> {
        self.scheduler.cancel_job(owner_id, name_or_id).await
    }

    pub async fn remind(
        &self,
        owner_id: &str,
        title: &str,
        body: Option<String>,
        due_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Reminder> {
        self.scheduler.remind(owner_id, title, body, due_at).await
    }

    // ── Component access ────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    pub fn scheduler(&self) -> &Arc<RecurringScheduler> {
        &self.scheduler
    }
}
