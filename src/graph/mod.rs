//! DAG planning and parallel execution.

pub mod executor;
pub mod model;
pub mod planner;

pub use executor::{GraphExecutor, RunOutcome};
pub use model::{GraphTask, GraphTaskStatus};
pub use planner::GraphPlanner;
