//! Objective decomposition into task DAGs.
//!
//! The planner delegates the actual decomposition to an external planning
//! collaborator and persists what comes back. It trusts the collaborator for
//! acyclicity — a cyclic plan is not rejected here; it would surface later as
//! an executor stall.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatch::Planner;
use crate::error::Result;
use crate::graph::model::GraphTask;
use crate::store::TaskStore;

/// One proposed node in the collaborator's plan output.
#[derive(Debug, Deserialize)]
struct PlannedNode {
    /// Plan-local id, used only to wire dependencies within this plan.
    id: String,
    title: String,
    description: String,
    #[serde(default = "default_agent")]
    agent: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

fn default_agent() -> String {
    "orchestrator".to_string()
}

/// Turns an objective string into a validated set of persisted graph tasks.
pub struct GraphPlanner {
    store: Arc<dyn TaskStore>,
    planner: Arc<dyn Planner>,
}

impl GraphPlanner {
    pub fn new(store: Arc<dyn TaskStore>, planner: Arc<dyn Planner>) -> Self {
        Self { store, planner }
    }

    /// Generate a plan for the objective and persist it.
    ///
    /// Returns the created task ids in plan order. Collaborator failures and
    /// unparseable output degrade to an empty plan with an error log rather
    /// than propagating; store failures are real errors.
    pub async fn plan(&self, objective: &str, owner_id: &str) -> Result<Vec<Uuid>> {
        info!(owner_id = %owner_id, "Planning objective: {objective}");

        let raw = match self.planner.propose(objective).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Planning collaborator failed; returning empty plan");
                return Ok(Vec::new());
            }
        };

        let nodes: Vec<PlannedNode> = match serde_json::from_str(strip_fences(&raw)) {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(error = %e, "Failed to parse plan output; returning empty plan");
                return Ok(Vec::new());
            }
        };

        // Pass 1: create every task row so all ids exist before any edge is
        // attached (avoids forward-reference failures).
        let mut local_ids: HashMap<String, Uuid> = HashMap::new();
        let mut created = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let task = GraphTask::new(
                owner_id,
                &node.title,
                &node.description,
                &node.agent,
                json!({ "original_objective": objective }),
            );
            self.store.create_task(&task).await?;
            local_ids.insert(node.id.clone(), task.id);
            created.push(task.id);
        }

        // Pass 2: wire dependency edges by local-id lookup.
        for node in &nodes {
            let task_id = local_ids[&node.id];
            for dep in &node.dependencies {
                match local_ids.get(dep) {
                    Some(&dep_id) => self.store.add_dependency(task_id, dep_id).await?,
                    None => {
                        warn!(local_id = %node.id, dependency = %dep, "Plan references unknown dependency; skipping edge");
                    }
                }
            }
        }

        info!(task_count = created.len(), "Plan created");
        Ok(created)
    }
}

/// Strip markdown code fences the model tends to wrap JSON in.
fn strip_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchError;
    use crate::graph::model::GraphTaskStatus;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct StaticPlanner(String);

    #[async_trait]
    impl Planner for StaticPlanner {
        async fn propose(&self, _objective: &str) -> std::result::Result<String, DispatchError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenPlanner;

    #[async_trait]
    impl Planner for BrokenPlanner {
        async fn propose(&self, _objective: &str) -> std::result::Result<String, DispatchError> {
            Err("model unavailable".into())
        }
    }

    const PLAN: &str = r#"```json
    [
        {"id": "a", "title": "Research topic", "description": "Dig", "agent": "researcher", "dependencies": []},
        {"id": "b", "title": "Write report", "description": "Summarize", "agent": "developer", "dependencies": ["a"]},
        {"id": "c", "title": "Review", "description": "Check", "dependencies": ["a", "b"]}
    ]
    ```"#;

    #[tokio::test]
    async fn plan_creates_tasks_and_edges() {
        let store = Arc::new(MemoryStore::new());
        let planner = GraphPlanner::new(store.clone(), Arc::new(StaticPlanner(PLAN.into())));

        let ids = planner.plan("build a report", "u1").await.unwrap();
        assert_eq!(ids.len(), 3);

        let tasks = store.get_tasks(&ids).await.unwrap();
        assert!(tasks.iter().all(|t| t.status == GraphTaskStatus::Todo));
        assert_eq!(tasks[0].assigned_agent, "researcher");
        // Missing agent field defaults to orchestrator
        assert_eq!(tasks[2].assigned_agent, "orchestrator");

        assert!(store.list_dependencies(ids[0]).await.unwrap().is_empty());
        assert_eq!(store.list_dependencies(ids[1]).await.unwrap(), vec![ids[0]]);
        assert_eq!(store.list_dependencies(ids[2]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn payload_carries_objective() {
        let store = Arc::new(MemoryStore::new());
        let planner = GraphPlanner::new(store.clone(), Arc::new(StaticPlanner(PLAN.into())));
        let ids = planner.plan("build a report", "u1").await.unwrap();
        let task = store.get_task(ids[0]).await.unwrap().unwrap();
        assert_eq!(
            task.payload["original_objective"].as_str(),
            Some("build a report")
        );
    }

    #[tokio::test]
    async fn malformed_output_degrades_to_empty_plan() {
        let store = Arc::new(MemoryStore::new());
        let planner = GraphPlanner::new(
            store,
            Arc::new(StaticPlanner("sorry, I can't do that".into())),
        );
        let ids = planner.plan("anything", "u1").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn collaborator_failure_degrades_to_empty_plan() {
        let store = Arc::new(MemoryStore::new());
        let planner = GraphPlanner::new(store, Arc::new(BrokenPlanner));
        let ids = planner.plan("anything", "u1").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn unknown_dependency_is_skipped() {
        let plan = r#"[{"id": "a", "title": "T", "description": "D", "dependencies": ["ghost"]}]"#;
        let store = Arc::new(MemoryStore::new());
        let planner = GraphPlanner::new(store.clone(), Arc::new(StaticPlanner(plan.into())));
        let ids = planner.plan("x", "u1").await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(store.list_dependencies(ids[0]).await.unwrap().is_empty());
    }

    #[test]
    fn strip_fences_variants() {
        assert_eq!(strip_fences("[1]"), "[1]");
        assert_eq!(strip_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("```\n[1]\n```"), "[1]");
    }
}
