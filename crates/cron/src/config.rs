use std::time::Duration;

use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;

pub const SECTION: &str = "cron";

/// Scheduler-wide settings from `[cron]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronConfig {
    pub enabled: bool,
    /// Watchdog poll interval while a task holds its lock.
    pub check_delay_unlocked: Duration,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_delay_unlocked: Duration::from_secs(60),
        }
    }
}

impl CronConfig {
    /// | Key                    | Default |
    /// |------------------------|---------|
    /// | `ENABLED`              | `true`  |
    /// | `CHECK_DELAY_UNLOCKED` | `60` s  |
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);
        let defaults = Self::default();
        Ok(Self {
            enabled: section.bool_or("ENABLED", defaults.enabled)?,
            check_delay_unlocked: section
                .duration_or("CHECK_DELAY_UNLOCKED", defaults.check_delay_unlocked)?,
        })
    }
}

/// Per-task settings from `[cron.<task>]`, layered over the task's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub enabled: bool,
    pub run_at_start: bool,
    pub schedule: String,
}

impl TaskConfig {
    pub fn new(schedule: &str) -> Self {
        Self {
            enabled: true,
            run_at_start: false,
            schedule: schedule.to_string(),
        }
    }

    pub fn run_at_start(mut self, run_at_start: bool) -> Self {
        self.run_at_start = run_at_start;
        self
    }

    /// Apply `ENABLED`, `RUN_AT_START` and `SCHEDULE` overrides for `name`.
    pub fn with_overrides(self, settings: &Settings, name: &str) -> Result<Self, CoreError> {
        let section_name = format!("{SECTION}.{name}");
        let section = settings.section(&section_name);
        Ok(Self {
            enabled: section.bool_or("ENABLED", self.enabled)?,
            run_at_start: section.bool_or("RUN_AT_START", self.run_at_start)?,
            schedule: section.string_or("SCHEDULE", &self.schedule),
        })
    }
}
