//! Storage seam for lock rows.
//!
//! [`PgCronLockStore`] is the production backend. [`MemoryCronLockStore`]
//! holds rows in process and applies each primitive under one mutex, which
//! gives the same single-row atomicity as the conditional UPDATEs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sourcegate_core::types::UnixTime;
use sourcegate_db::models::cron_lock::{CronJobLock, CronLockStatus, LockOwner};
use sourcegate_db::repositories::CronJobLockRepo;
use sourcegate_db::DbPool;

use crate::error::CronError;

/// Primitive row operations the lock registry is built on.
///
/// Mutating calls return the number of rows they changed.
#[async_trait]
pub trait CronLockStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<CronJobLock>, CronError>;

    async fn list(&self) -> Result<Vec<CronJobLock>, CronError>;

    async fn insert_if_absent(&self, name: &str, next: UnixTime) -> Result<bool, CronError>;

    async fn try_acquire(
        &self,
        name: &str,
        start: UnixTime,
        owner: &LockOwner,
    ) -> Result<u64, CronError>;

    async fn mark_failed_run(
        &self,
        name: &str,
        at: UnixTime,
        message: &str,
    ) -> Result<u64, CronError>;

    async fn release(
        &self,
        name: &str,
        next: UnixTime,
        status: CronLockStatus,
        owner: &LockOwner,
    ) -> Result<u64, CronError>;

    async fn force_release(&self, name: &str) -> Result<u64, CronError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

pub struct PgCronLockStore {
    pool: DbPool,
}

impl PgCronLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CronLockStore for PgCronLockStore {
    async fn get(&self, name: &str) -> Result<Option<CronJobLock>, CronError> {
        Ok(CronJobLockRepo::find_by_name(&self.pool, name).await?)
    }

    async fn list(&self) -> Result<Vec<CronJobLock>, CronError> {
        Ok(CronJobLockRepo::list(&self.pool).await?)
    }

    async fn insert_if_absent(&self, name: &str, next: UnixTime) -> Result<bool, CronError> {
        Ok(CronJobLockRepo::insert_if_absent(&self.pool, name, next).await?)
    }

    async fn try_acquire(
        &self,
        name: &str,
        start: UnixTime,
        owner: &LockOwner,
    ) -> Result<u64, CronError> {
        Ok(CronJobLockRepo::try_acquire(&self.pool, name, start, owner).await?)
    }

    async fn mark_failed_run(
        &self,
        name: &str,
        at: UnixTime,
        message: &str,
    ) -> Result<u64, CronError> {
        Ok(CronJobLockRepo::mark_failed_run(&self.pool, name, at, message).await?)
    }

    async fn release(
        &self,
        name: &str,
        next: UnixTime,
        status: CronLockStatus,
        owner: &LockOwner,
    ) -> Result<u64, CronError> {
        Ok(CronJobLockRepo::release(&self.pool, name, next, status, owner).await?)
    }

    async fn force_release(&self, name: &str) -> Result<u64, CronError> {
        Ok(CronJobLockRepo::force_release(&self.pool, name).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCronLockStore {
    rows: Mutex<BTreeMap<String, CronJobLock>>,
}

impl MemoryCronLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the row named `name`, returning 1 if it matched.
    fn update<P, F>(&self, name: &str, matches: P, f: F) -> u64
    where
        P: FnOnce(&CronJobLock) -> bool,
        F: FnOnce(&mut CronJobLock),
    {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(name) {
            Some(row) if matches(row) => {
                f(row);
                row.updated_at = Utc::now();
                1
            }
            _ => 0,
        }
    }

    /// Overwrite a row as-is.
    pub fn put(&self, row: CronJobLock) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(row.name.clone(), row);
    }
}

#[async_trait]
impl CronLockStore for MemoryCronLockStore {
    async fn get(&self, name: &str) -> Result<Option<CronJobLock>, CronError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<CronJobLock>, CronError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.values().cloned().collect())
    }

    async fn insert_if_absent(&self, name: &str, next: UnixTime) -> Result<bool, CronError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if rows.contains_key(name) {
            return Ok(false);
        }
        let now = Utc::now();
        let id = rows.len() as i64 + 1;
        rows.insert(
            name.to_string(),
            CronJobLock {
                id,
                name: name.to_string(),
                status: CronLockStatus::Registered.as_str().to_string(),
                next,
                prev: 0,
                locked: false,
                host_name: String::new(),
                host_ip: String::new(),
                process_uuid: String::new(),
                last_failed_run: 0,
                last_failed_run_message: String::new(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn try_acquire(
        &self,
        name: &str,
        start: UnixTime,
        owner: &LockOwner,
    ) -> Result<u64, CronError> {
        Ok(self.update(
            name,
            |row| !row.locked,
            |row| {
                row.status = CronLockStatus::Process.as_str().to_string();
                row.prev = start;
                row.locked = true;
                row.host_name = owner.host_name.clone();
                row.host_ip = owner.host_ip.clone();
                row.process_uuid = owner.process_uuid.clone();
            },
        ))
    }

    async fn mark_failed_run(
        &self,
        name: &str,
        at: UnixTime,
        message: &str,
    ) -> Result<u64, CronError> {
        Ok(self.update(
            name,
            |_| true,
            |row| {
                row.last_failed_run = at;
                row.last_failed_run_message = message.to_string();
            },
        ))
    }

    async fn release(
        &self,
        name: &str,
        next: UnixTime,
        status: CronLockStatus,
        owner: &LockOwner,
    ) -> Result<u64, CronError> {
        Ok(self.update(
            name,
            |row| row.is_owned_by(owner),
            |row| {
                row.status = status.as_str().to_string();
                row.next = next;
                row.locked = false;
            },
        ))
    }

    async fn force_release(&self, name: &str) -> Result<u64, CronError> {
        Ok(self.update(
            name,
            |_| true,
            |row| {
                row.status = CronLockStatus::Finished.as_str().to_string();
                row.locked = false;
            },
        ))
    }
}
