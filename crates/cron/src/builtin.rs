//! Tasks every deployment registers.

use sourcegate_audit::AuditSink;
use sourcegate_core::config::Settings;

use crate::config::TaskConfig;
use crate::error::CronError;
use crate::task::Task;

pub const AUDIT_LOG_CLEANUP: &str = "audit_log_cleanup";

/// Daily purge of rotated audit files past their retention.
pub fn audit_log_cleanup(settings: &Settings, audit: AuditSink) -> Result<Task, CronError> {
    let config = TaskConfig::new("@daily").with_overrides(settings, AUDIT_LOG_CLEANUP)?;
    Task::new(AUDIT_LOG_CLEANUP, config, move |_cancel| {
        let audit = audit.clone();
        async move {
            audit.purge_expired().await;
            Ok(())
        }
    })
}
