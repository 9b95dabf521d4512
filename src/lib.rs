//! Task orchestration engine for agent platforms.
//!
//! Three execution styles around one store:
//!
//! - **Background tasks** ([`tracker`]) — fire-and-forget work with a
//!   progress log, cooperative cancellation, and completion notifications.
//! - **Planned execution** ([`graph`]) — an objective is broken into a
//!   dependency graph of tasks, then executed with maximum parallelism and
//!   stall detection.
//! - **Recurring jobs and reminders** ([`scheduler`]) — cron-driven actions
//!   and one-shot due-date reminders, evaluated tick by tick from durable
//!   state.
//!
//! What "executing" actually means is left to the [`dispatch`] traits, so
//! the engine stays independent of any particular agent runtime.

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod store;
pub mod tracker;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use graph::{GraphExecutor, GraphPlanner, GraphTask, GraphTaskStatus, RunOutcome};
pub use scheduler::{Reminder, RecurringJob, RecurringScheduler};
pub use store::{LibSqlStore, MemoryStore, TaskStore};
pub use tracker::{TaskRecord, TaskStatus, TaskTracker, TaskView};
