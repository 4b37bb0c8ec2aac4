//! Cron expression schedules.
//!
//! Standard five-field expressions get a leading seconds field; the
//! `@yearly`..`@hourly` shorthands are accepted. Interval schedules
//! (`@every 5m`) are rejected so every lock row always has a concrete next
//! fire time.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::CronError;

#[derive(Debug, Clone)]
pub struct Schedule {
    expr: String,
    inner: cron::Schedule,
}

impl Schedule {
    pub fn parse(task: &str, expr: &str) -> Result<Self, CronError> {
        let invalid = |reason: String| CronError::InvalidSchedule {
            name: task.to_string(),
            schedule: expr.to_string(),
            reason,
        };

        let trimmed = expr.trim();
        if trimmed.starts_with("@every") {
            return Err(invalid("interval schedules are not supported".into()));
        }

        let normalized = if !trimmed.starts_with('@') && trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };

        let inner = cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expr: trimmed.to_string(),
            inner,
        })
    }

    /// The expression as configured.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&after).next()
    }
}
