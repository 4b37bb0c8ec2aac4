//! Repository for the `cron_job_lock` table.
//!
//! Acquisition and release are single conditional UPDATEs so the database
//! row is the only serialization point between replicas. Mutating calls
//! return the affected-row count and leave interpretation to the caller.

use sqlx::PgPool;
use sourcegate_core::types::UnixTime;

use crate::models::cron_lock::{CronJobLock, CronLockStatus, LockOwner};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, status, next, prev, locked, host_name, host_ip, process_uuid, \
                       last_failed_run, last_failed_run_message, created_at, updated_at";

pub struct CronJobLockRepo;

impl CronJobLockRepo {
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<CronJobLock>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cron_job_lock WHERE name = $1");
        sqlx::query_as::<_, CronJobLock>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// All lock rows ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<CronJobLock>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cron_job_lock ORDER BY name ASC");
        sqlx::query_as::<_, CronJobLock>(&query).fetch_all(pool).await
    }

    /// Insert a `registered` row unless one already exists.
    ///
    /// Returns `true` when a row was created.
    pub async fn insert_if_absent(
        pool: &PgPool,
        name: &str,
        next: UnixTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO cron_job_lock (name, status, next, locked)
             VALUES ($1, $2, $3, FALSE)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(CronLockStatus::Registered.as_str())
        .bind(next)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Take the lock if nobody holds it, writing every owner field at once.
    pub async fn try_acquire(
        pool: &PgPool,
        name: &str,
        start: UnixTime,
        owner: &LockOwner,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cron_job_lock
             SET status = $2, prev = $3, locked = TRUE,
                 host_name = $4, host_ip = $5, process_uuid = $6, updated_at = NOW()
             WHERE name = $1 AND locked = FALSE",
        )
        .bind(name)
        .bind(CronLockStatus::Process.as_str())
        .bind(start)
        .bind(&owner.host_name)
        .bind(&owner.host_ip)
        .bind(&owner.process_uuid)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record that a scheduled start was skipped because the lock was held.
    pub async fn mark_failed_run(
        pool: &PgPool,
        name: &str,
        at: UnixTime,
        message: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cron_job_lock
             SET last_failed_run = $2, last_failed_run_message = $3, updated_at = NOW()
             WHERE name = $1",
        )
        .bind(name)
        .bind(at)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Release a lock held by `owner`. Zero rows means it was taken over.
    pub async fn release(
        pool: &PgPool,
        name: &str,
        next: UnixTime,
        status: CronLockStatus,
        owner: &LockOwner,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cron_job_lock
             SET status = $2, next = $3, locked = FALSE, updated_at = NOW()
             WHERE name = $1 AND host_name = $4 AND host_ip = $5 AND process_uuid = $6",
        )
        .bind(name)
        .bind(status.as_str())
        .bind(next)
        .bind(&owner.host_name)
        .bind(&owner.host_ip)
        .bind(&owner.process_uuid)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear the lock regardless of owner.
    pub async fn force_release(pool: &PgPool, name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cron_job_lock
             SET status = $2, locked = FALSE, updated_at = NOW()
             WHERE name = $1",
        )
        .bind(name)
        .bind(CronLockStatus::Finished.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
