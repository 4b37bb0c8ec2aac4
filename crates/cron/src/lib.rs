//! Scheduler-independent distributed locking for recurring tasks.
//!
//! Every replica runs the same schedule. A run only executes its action
//! after winning the task's lock row, so each fire time executes at most
//! once across the fleet.

pub mod builtin;
pub mod config;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod store;
pub mod task;

pub use config::{CronConfig, TaskConfig};
pub use error::CronError;
pub use registry::LockRegistry;
pub use schedule::Schedule;
pub use service::{CronService, TaskSnapshot};
pub use store::{CronLockStore, MemoryCronLockStore, PgCronLockStore};
pub use task::{RunOutcome, Task, TaskState, Trigger};
