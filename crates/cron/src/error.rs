use sourcegate_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum CronError {
    #[error("cron task {name} is already locked")]
    AlreadyLocked { name: String },

    #[error("cron task {name}: invalid schedule `{schedule}`: {reason}")]
    InvalidSchedule {
        name: String,
        schedule: String,
        reason: String,
    },

    #[error("cron task {0} is not registered")]
    NotRegistered(String),

    #[error("cron task {0} is registered twice")]
    Duplicate(String),

    #[error("cron task {0} is disabled")]
    Disabled(String),

    #[error("cron lock store: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Config(#[from] CoreError),
}
