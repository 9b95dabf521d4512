//! Recurring job and reminder models, plus cron evaluation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::error::ScheduleError;

/// A durable cron-scheduled unit of work.
///
/// Soft-deactivated on cancellation, never hard-deleted. `last_run_at` is
/// monotonically non-decreasing (enforced by the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringJob {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    /// Standard crontab format; 5-field expressions are accepted and
    /// normalized at evaluation time.
    pub cron_expr: String,
    /// Target action: capability name plus stored parameters.
    pub tool_name: String,
    pub parameters: Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl RecurringJob {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        cron_expr: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            cron_expr: cron_expr.into(),
            tool_name: tool_name.into(),
            parameters,
            active: true,
            created_at: Utc::now(),
            last_run_at: None,
        }
    }
}

/// A one-shot due-date reminder (not cron-based).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub body: Option<String>,
    pub due_at: DateTime<Utc>,
    /// Set after the single notification fires, so re-scanning the same
    /// window does not duplicate.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        body: Option<String>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            body,
            due_at,
            notified: false,
            created_at: Utc::now(),
        }
    }
}

/// Parse a cron expression, accepting standard 5-field crontab form.
///
/// The `cron` crate wants a seconds field; 5-field input gets `0` prepended
/// so `* * * * *` means "every minute at second zero", matching crontab.
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule, ScheduleError> {
    let normalized = normalize_cron(expr)?;
    cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

fn normalize_cron(expr: &str) -> Result<String, ScheduleError> {
    let fields = expr.split_whitespace().count();
    match fields {
        5 => Ok(format!("0 {}", expr.trim())),
        6 | 7 => Ok(expr.trim().to_string()),
        n => Err(ScheduleError::InvalidCron {
            expr: expr.to_string(),
            reason: format!("expected 5-7 fields, got {n}"),
        }),
    }
}

/// Decide whether a job is due at `now`.
///
/// With a previous run, due iff the first scheduled occurrence strictly
/// after `last_run` has passed. Never-run jobs fire only if the most recent
/// occurrence fell within `bootstrap` — bootstrapping without replaying
/// every historical tick, at the cost of possibly skipping one when the
/// check loop itself is delayed.
pub fn is_due(
    expr: &str,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    bootstrap: Duration,
) -> bool {
    let schedule = match parse_schedule(expr) {
        Ok(schedule) => schedule,
        Err(e) => {
            // Validated at schedule time; a bad expression here is a stored
            // legacy row. Skip it rather than poisoning the tick.
            error!(cron = %expr, error = %e, "Unparseable cron expression");
            return false;
        }
    };

    match last_run {
        Some(last) => schedule
            .after(&last)
            .next()
            .map(|next| next <= now)
            .unwrap_or(false),
        None => {
            let window = chrono::Duration::from_std(bootstrap)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            schedule
                .after(&(now - window))
                .next()
                .map(|occurrence| occurrence <= now)
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MINUTELY: &str = "* * * * *";

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
    }

    #[test]
    fn five_field_normalization() {
        assert!(parse_schedule(MINUTELY).is_ok());
        assert!(parse_schedule("0 8 * * *").is_ok());
    }

    #[test]
    fn six_field_passthrough() {
        assert!(parse_schedule("0 * * * * *").is_ok());
    }

    #[test]
    fn invalid_expressions_rejected() {
        assert!(parse_schedule("not a cron").is_err());
        assert!(parse_schedule("* *").is_err());
        assert!(parse_schedule("99 99 * * *").is_err());
    }

    #[test]
    fn never_run_fires_within_bootstrap_window() {
        // Most recent minutely tick (10:30:00) is 5s before now
        let now = at(10, 30, 5);
        assert!(is_due(MINUTELY, None, now, Duration::from_secs(60)));
    }

    #[test]
    fn never_run_skips_old_occurrences() {
        // Daily at 08:00, now is 10:30 — last occurrence 2.5h ago
        let now = at(10, 30, 0);
        assert!(!is_due("0 8 * * *", None, now, Duration::from_secs(60)));
    }

    #[test]
    fn due_after_next_occurrence_passes() {
        let last = at(10, 29, 0);
        let now = at(10, 30, 5);
        assert!(is_due(MINUTELY, Some(last), now, Duration::from_secs(60)));
    }

    #[test]
    fn fires_at_most_once_per_tick() {
        // 60 evaluations within the same wall-clock minute: the first tick
        // fires (bootstrap), every later one sees last_run and stays quiet.
        let mut last_run: Option<DateTime<Utc>> = None;
        let mut fired = 0;
        for s in 0..60 {
            let now = at(10, 30, s);
            if is_due(MINUTELY, last_run, now, Duration::from_secs(60)) {
                fired += 1;
                last_run = Some(now);
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn fires_again_next_minute() {
        let last = at(10, 30, 2);
        assert!(!is_due(MINUTELY, Some(last), at(10, 30, 59), Duration::from_secs(60)));
        assert!(is_due(MINUTELY, Some(last), at(10, 31, 0), Duration::from_secs(60)));
    }

    #[test]
    fn bad_stored_expression_is_never_due() {
        assert!(!is_due("garbage", None, Utc::now(), Duration::from_secs(60)));
    }

    #[test]
    fn reminder_starts_unnotified() {
        let reminder = Reminder::new("u1", "standup", None, Utc::now());
        assert!(!reminder.notified);
    }

    #[test]
    fn job_starts_active_and_unrun() {
        let job = RecurringJob::new("u1", "daily", "0 8 * * *", "notify_user", Value::Null);
        assert!(job.active);
        assert!(job.last_run_at.is_none());
    }
}
