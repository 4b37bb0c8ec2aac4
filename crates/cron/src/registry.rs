//! Named mutex over lock rows shared by every replica.

use std::sync::Arc;

use sourcegate_core::host::HostInfo;
use sourcegate_core::types::{now_unix, UnixTime};
use sourcegate_db::models::cron_lock::{CronJobLock, CronLockStatus, LockOwner};

use crate::error::CronError;
use crate::store::CronLockStore;

/// A held lock older than this is reported as a skipped start.
pub const STALE_AFTER_SECS: i64 = 30;

pub const STALE_MESSAGE: &str = "task was not started";

#[derive(Clone)]
pub struct LockRegistry {
    store: Arc<dyn CronLockStore>,
    host_name: String,
    host_ip: String,
}

impl LockRegistry {
    /// Registry identifying this process by the local host name and IP.
    pub fn new(store: Arc<dyn CronLockStore>) -> Self {
        let host = HostInfo::current();
        Self::with_host(store, &host.name, &host.ip)
    }

    pub fn with_host(store: Arc<dyn CronLockStore>, host_name: &str, host_ip: &str) -> Self {
        Self {
            store,
            host_name: host_name.to_string(),
            host_ip: host_ip.to_string(),
        }
    }

    pub fn owner(&self, process_uuid: &str) -> LockOwner {
        LockOwner {
            host_name: self.host_name.clone(),
            host_ip: self.host_ip.clone(),
            process_uuid: process_uuid.to_string(),
        }
    }

    /// Create the row for `name` if it does not exist yet.
    pub async fn register(&self, name: &str, next: UnixTime) -> Result<(), CronError> {
        if self.store.insert_if_absent(name, next).await? {
            tracing::debug!(task = name, "Cron lock row created");
        }
        Ok(())
    }

    /// Take the lock for one run identified by `process_uuid`.
    pub async fn lock(
        &self,
        name: &str,
        start: UnixTime,
        process_uuid: &str,
    ) -> Result<LockOwner, CronError> {
        let row = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| CronError::NotRegistered(name.to_string()))?;

        if row.locked {
            return Err(self.already_locked(&row).await);
        }

        let owner = self.owner(process_uuid);
        if self.store.try_acquire(name, start, &owner).await? == 0 {
            let row = self.store.get(name).await?.unwrap_or(row);
            return Err(self.already_locked(&row).await);
        }
        Ok(owner)
    }

    async fn already_locked(&self, row: &CronJobLock) -> CronError {
        let now = now_unix();
        if now - row.prev >= STALE_AFTER_SECS {
            tracing::warn!(
                task = %row.name,
                holder = %row.host_name,
                locked_since = row.prev,
                "Cron lock held past its start window"
            );
            if let Err(e) = self.store.mark_failed_run(&row.name, now, STALE_MESSAGE).await {
                tracing::error!(task = %row.name, error = %e, "Failed to record skipped cron start");
            }
        }
        CronError::AlreadyLocked {
            name: row.name.clone(),
        }
    }

    /// Release a lock taken by `process_uuid`. Returns zero when the row is
    /// no longer owned by this run.
    pub async fn unlock(
        &self,
        name: &str,
        next: UnixTime,
        status: CronLockStatus,
        process_uuid: &str,
    ) -> Result<u64, CronError> {
        self.store
            .release(name, next, status, &self.owner(process_uuid))
            .await
    }

    /// Clear the lock regardless of who holds it.
    pub async fn force_unlock(&self, name: &str) -> Result<u64, CronError> {
        self.store.force_release(name).await
    }

    pub async fn get(&self, name: &str) -> Result<Option<CronJobLock>, CronError> {
        self.store.get(name).await
    }

    pub async fn list(&self) -> Result<Vec<CronJobLock>, CronError> {
        self.store.list().await
    }
}
