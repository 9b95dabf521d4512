//! Concurrency-safe execution of graph task sets.
//!
//! Poll-until-quiescent: each pass loads the working set, claims the
//! runnable tasks as one batch, fans out their dispatches, and fans in
//! before re-evaluating. The claim (`todo → in_progress`) is the single
//! atomic conditional update in the system; losing a claim means another
//! pass is already running that task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dispatch::AgentDispatch;
use crate::error::Result;
use crate::graph::model::{GraphTask, GraphTaskStatus};
use crate::store::TaskStore;

/// Terminal condition of a plan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task in the working set reached `done` or `cancelled`.
    Complete,
    /// No task is runnable and none is in flight, but some remain
    /// non-terminal — typically a failed or missing upstream dependency.
    /// Dependents are left as-is for diagnosis, not forced terminal.
    Stalled { remaining: Vec<Uuid> },
}

/// Drives a named set of graph tasks to completion or a detected stall.
pub struct GraphExecutor {
    store: Arc<dyn TaskStore>,
    dispatch: Arc<dyn AgentDispatch>,
    config: EngineConfig,
}

impl GraphExecutor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        dispatch: Arc<dyn AgentDispatch>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            dispatch,
            config,
        }
    }

    /// Run the named subset of graph tasks until quiescence or stall.
    pub async fn run(&self, task_ids: &[Uuid]) -> Result<RunOutcome> {
        loop {
            let tasks = self.store.get_tasks(task_ids).await?;

            let incomplete: Vec<&GraphTask> =
                tasks.iter().filter(|t| !t.status.is_terminal()).collect();
            if incomplete.is_empty() {
                info!("All tasks in plan complete");
                return Ok(RunOutcome::Complete);
            }

            let runnable = self.runnable_set(&tasks, &incomplete).await?;

            if runnable.is_empty() {
                let in_flight = incomplete
                    .iter()
                    .any(|t| t.status == GraphTaskStatus::InProgress);
                if !in_flight {
                    let remaining: Vec<Uuid> = incomplete.iter().map(|t| t.id).collect();
                    warn!(
                        remaining = remaining.len(),
                        "Stall detected: no runnable tasks and none in flight"
                    );
                    return Ok(RunOutcome::Stalled { remaining });
                }
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            // Claim the whole runnable set before dispatching anything. A
            // task whose conditional update reports no change was taken by a
            // concurrent pass and must not be dispatched twice.
            let mut claimed = Vec::with_capacity(runnable.len());
            for task in runnable {
                if self.store.claim_task(task.id).await? {
                    claimed.push(task);
                } else {
                    debug!(task_id = %task.id, "Lost claim to concurrent executor pass");
                }
            }

            // Fan-out, then fan-in before the next poll.
            let results = join_all(claimed.iter().map(|t| self.execute_single(t))).await;
            for result in results {
                result?;
            }
        }
    }

    /// `todo` tasks whose dependencies are all `done`.
    async fn runnable_set(
        &self,
        loaded: &[GraphTask],
        incomplete: &[&GraphTask],
    ) -> Result<Vec<GraphTask>> {
        let by_id: HashMap<Uuid, GraphTaskStatus> =
            loaded.iter().map(|t| (t.id, t.status)).collect();

        let mut runnable = Vec::new();
        for task in incomplete {
            if task.status != GraphTaskStatus::Todo {
                continue;
            }
            let mut deps_met = true;
            for dep_id in self.store.list_dependencies(task.id).await? {
                let status = match by_id.get(&dep_id) {
                    Some(status) => Some(*status),
                    // Dependency outside the working set — consult the store.
                    None => self.store.get_task(dep_id).await?.map(|t| t.status),
                };
                if status != Some(GraphTaskStatus::Done) {
                    deps_met = false;
                    break;
                }
            }
            if deps_met {
                runnable.push((*task).clone());
            }
        }
        Ok(runnable)
    }

    /// Dispatch one claimed task with bounded retry.
    ///
    /// Success stores the result and marks `done`; exhausted retries mark
    /// `cancelled` with the failure reason. Dispatch errors never propagate —
    /// only store errors do.
    async fn execute_single(&self, task: &GraphTask) -> Result<()> {
        info!(
            task_id = %task.id,
            agent = %task.assigned_agent,
            "Executing task: {}",
            task.title
        );

        let mut attempt = 0u32;
        loop {
            match self.dispatch.execute(task).await {
                Ok(result) => {
                    self.store.complete_task(task.id, result).await?;
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        let reason = e.to_string();
                        error!(
                            task_id = %task.id,
                            attempts = attempt,
                            error = %reason,
                            "Task failed after retries"
                        );
                        self.store.cancel_task(task.id, &reason).await?;
                        return Ok(());
                    }
                    let delay = backoff_with_jitter(self.config.retry_base_delay, attempt);
                    warn!(
                        task_id = %task.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Task dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Exponential backoff with uniform jitter: `base * 2^(attempt-1) + rand(0..base)`.
fn backoff_with_jitter(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16));
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64);
    exp + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt() {
        let base = Duration::from_millis(100);
        let first = backoff_with_jitter(base, 1);
        let third = backoff_with_jitter(base, 3);
        assert!(first >= base);
        assert!(first <= base * 2);
        assert!(third >= base * 4);
        assert!(third <= base * 5);
    }
}
