//! Cron-driven recurring execution and one-shot reminders.
//!
//! The scheduler is tick-based: a loop calls [`RecurringScheduler::tick`]
//! on a fixed interval, and each tick independently decides which jobs are
//! due from their cron expression and last run time. Nothing is kept in
//! memory between ticks, so a restart picks up exactly where the stored
//! `last_run_at` values left off.

mod job;

pub use job::{Reminder, RecurringJob};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::dispatch::{ActionDispatch, Notifier, NotifyEvent};
use crate::error::{Result, ScheduleError};
use crate::store::TaskStore;

pub struct RecurringScheduler {
    store: Arc<dyn TaskStore>,
    action: Arc<dyn ActionDispatch>,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    config: EngineConfig,
}

impl RecurringScheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        action: Arc<dyn ActionDispatch>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            action,
            notifiers: RwLock::new(Vec::new()),
            config,
        }
    }

    pub async fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers.write().await.push(notifier);
    }

    /// Create a recurring job after validating the cron expression.
    ///
    /// The expression is stored as given; normalization happens at
    /// evaluation time so listings show what the caller wrote.
    pub async fn schedule(
        &self,
        owner_id: &str,
        name: &str,
        cron_expr: &str,
        tool_name: &str,
        parameters: Value,
    ) -> Result<RecurringJob> {
        job::parse_schedule(cron_expr)?;
        let job = RecurringJob::new(owner_id, name, cron_expr, tool_name, parameters);
        self.store.create_job(&job).await?;
        info!(job_id = %job.id, name = %job.name, cron = %job.cron_expr, "Scheduled recurring job");
        Ok(job)
    }

    pub async fn list_jobs(&self, owner_id: &str) -> Result<Vec<RecurringJob>> {
        Ok(self.store.list_jobs(owner_id, true).await?)
    }

    /// Soft-deactivate a job, looked up by id or by name within the owner's
    /// jobs. The row survives for audit; it just stops firing.
    pub async fn cancel_job(&self, owner_id: &str, name_or_id: &str) -> Result<RecurringJob> {
        let job = self
            .store
            .find_job(owner_id, name_or_id)
            .await?
            .ok_or_else(|| ScheduleError::JobNotFound(name_or_id.to_string()))?;
        self.store.deactivate_job(job.id).await?;
        info!(job_id = %job.id, name = %job.name, "Cancelled recurring job");
        Ok(job)
    }

    /// Create a one-shot reminder due at `due_at`.
    pub async fn remind(
        &self,
        owner_id: &str,
        title: &str,
        body: Option<String>,
        due_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Reminder> {
        let reminder = Reminder::new(owner_id, title, body, due_at);
        self.store.create_reminder(&reminder).await?;
        info!(reminder_id = %reminder.id, due_at = %reminder.due_at, "Created reminder");
        Ok(reminder)
    }

    /// Evaluate every active job against the current time and run the due
    /// ones. Returns how many fired successfully.
    ///
    /// `last_run_at` is advanced only on success, so a failed action is
    /// retried on the next tick rather than silently dropped.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let jobs = self.store.list_active_jobs().await?;
        let mut fired = 0;

        for job in jobs {
            if !job::is_due(
                &job.cron_expr,
                job.last_run_at,
                now,
                self.config.cron_bootstrap_window,
            ) {
                continue;
            }

            debug!(job_id = %job.id, name = %job.name, "Recurring job due");
            match self.action.invoke(&job).await {
                Ok(result) => {
                    self.store.touch_job_last_run(job.id, now).await?;
                    self.notify_all(&NotifyEvent::JobFired {
                        job: job.clone(),
                        result,
                    })
                    .await;
                    fired += 1;
                }
                Err(e) => {
                    error!(job_id = %job.id, name = %job.name, error = %e, "Recurring job action failed");
                }
            }
        }

        Ok(fired)
    }

    /// Notify for reminders falling due within the configured window.
    /// Each reminder notifies exactly once; the `notified` flag is set
    /// before moving on so overlapping scans cannot duplicate.
    pub async fn check_due_reminders(&self) -> Result<usize> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.config.reminder_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let due = self.store.list_due_reminders(now - window, now).await?;
        let mut notified = 0;

        for reminder in due {
            self.store.mark_reminder_notified(reminder.id).await?;
            self.notify_all(&NotifyEvent::ReminderDue(reminder)).await;
            notified += 1;
        }

        Ok(notified)
    }

    async fn notify_all(&self, event: &NotifyEvent) {
        let notifiers = self.notifiers.read().await;
        for notifier in notifiers.iter() {
            if let Err(e) = notifier.notify(event).await {
                error!(error = %e, "Notifier failed");
            }
        }
    }
}

/// Spawn the scheduler loop: one serial tick (jobs then reminders) per
/// interval. The first tick waits a full interval rather than firing
/// immediately at startup.
pub fn spawn_scheduler_loop(
    scheduler: Arc<RecurringScheduler>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = scheduler.tick().await {
                error!(error = %e, "Scheduler tick failed");
            }
            if let Err(e) = scheduler.check_due_reminders().await {
                error!(error = %e, "Reminder check failed");
            }
        }
    })
}
