//! Configuration types.

use std::time::Duration;

/// Engine configuration.
///
/// Poll intervals and detection windows are configuration rather than
/// constants so tests can shrink them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between executor polls while claimed tasks are in flight.
    pub poll_interval: Duration,
    /// Maximum dispatch attempts per graph task before it is recorded as failed.
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff (doubled per attempt, plus jitter).
    pub retry_base_delay: Duration,
    /// Completed tracked tasks older than this are removed by `sweep`.
    pub sweep_max_age: Duration,
    /// Interval between tracker sweep passes.
    pub sweep_interval: Duration,
    /// A never-run cron job fires only if its most recent scheduled tick
    /// fell within this window (prevents catch-up storms after downtime).
    pub cron_bootstrap_window: Duration,
    /// Trailing window scanned for due reminders on each check.
    pub reminder_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            sweep_max_age: Duration::from_secs(24 * 3600), // 24 hours
            sweep_interval: Duration::from_secs(3600),     // 1 hour
            cron_bootstrap_window: Duration::from_secs(60),
            reminder_window: Duration::from_secs(60),
        }
    }
}
