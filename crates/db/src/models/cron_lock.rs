//! Cron lock row model.

use serde::Serialize;
use sqlx::FromRow;
use sourcegate_core::types::{DbId, Timestamp, UnixTime};

/// Declares an enum stored as a lowercase TEXT column.
macro_rules! define_text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Value stored in the database column.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $val ),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use define_text_enum;

define_text_enum! {
    /// Lifecycle of a cron lock row.
    CronLockStatus {
        Registered = "registered",
        /// A replica holds the lock and is running the task.
        Process = "process",
        Finished = "finished",
        Cancelled = "cancelled",
        Error = "error",
    }
}

/// A row from the `cron_job_lock` table.
///
/// `next`, `prev` and `last_failed_run` are Unix seconds; `0` means never.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CronJobLock {
    pub id: DbId,
    pub name: String,
    pub status: String,
    pub next: UnixTime,
    pub prev: UnixTime,
    pub locked: bool,
    pub host_name: String,
    pub host_ip: String,
    pub process_uuid: String,
    pub last_failed_run: UnixTime,
    pub last_failed_run_message: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CronJobLock {
    /// Parsed status; unknown values read as `Error`.
    pub fn lock_status(&self) -> CronLockStatus {
        CronLockStatus::parse(&self.status).unwrap_or(CronLockStatus::Error)
    }

    pub fn is_owned_by(&self, owner: &LockOwner) -> bool {
        self.host_name == owner.host_name
            && self.host_ip == owner.host_ip
            && self.process_uuid == owner.process_uuid
    }
}

/// Identity of one task run holding a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockOwner {
    pub host_name: String,
    pub host_ip: String,
    pub process_uuid: String,
}
