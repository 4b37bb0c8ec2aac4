//! Cron lock repository against a real database.
//!
//! Requires `DATABASE_URL`; run with `cargo test -- --ignored`.

use sqlx::PgPool;
use sourcegate_db::models::cron_lock::{CronLockStatus, LockOwner};
use sourcegate_db::repositories::CronJobLockRepo;

fn owner(uuid: &str) -> LockOwner {
    LockOwner {
        host_name: "node-a".to_string(),
        host_ip: "10.0.0.1".to_string(),
        process_uuid: uuid.to_string(),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_is_idempotent(pool: PgPool) {
    assert!(CronJobLockRepo::insert_if_absent(&pool, "purge", 100).await.unwrap());
    assert!(!CronJobLockRepo::insert_if_absent(&pool, "purge", 200).await.unwrap());

    let row = CronJobLockRepo::find_by_name(&pool, "purge").await.unwrap().unwrap();
    assert_eq!(row.next, 100);
    assert!(!row.locked);
    assert_eq!(row.lock_status(), CronLockStatus::Registered);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn only_one_concurrent_acquire_wins(pool: PgPool) {
    CronJobLockRepo::insert_if_absent(&pool, "purge", 0).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            CronJobLockRepo::try_acquire(&pool, "purge", 1, &owner(&format!("uuid-{i}")))
                .await
                .unwrap()
        }));
    }
    let mut winners = 0;
    for handle in handles {
        winners += handle.await.unwrap();
    }
    assert_eq!(winners, 1);

    let row = CronJobLockRepo::find_by_name(&pool, "purge").await.unwrap().unwrap();
    assert!(row.locked);
    assert_eq!(row.lock_status(), CronLockStatus::Process);
    assert!(row.process_uuid.starts_with("uuid-"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn release_requires_matching_owner(pool: PgPool) {
    CronJobLockRepo::insert_if_absent(&pool, "purge", 0).await.unwrap();
    CronJobLockRepo::try_acquire(&pool, "purge", 1, &owner("mine")).await.unwrap();

    let stolen = CronJobLockRepo::release(&pool, "purge", 99, CronLockStatus::Finished, &owner("other"))
        .await
        .unwrap();
    assert_eq!(stolen, 0);
    let row = CronJobLockRepo::find_by_name(&pool, "purge").await.unwrap().unwrap();
    assert!(row.locked);
    assert_eq!(row.next, 0);

    let released = CronJobLockRepo::release(&pool, "purge", 99, CronLockStatus::Finished, &owner("mine"))
        .await
        .unwrap();
    assert_eq!(released, 1);
    let row = CronJobLockRepo::find_by_name(&pool, "purge").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.next, 99);
    assert_eq!(row.lock_status(), CronLockStatus::Finished);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn force_release_ignores_owner(pool: PgPool) {
    CronJobLockRepo::insert_if_absent(&pool, "purge", 0).await.unwrap();
    CronJobLockRepo::try_acquire(&pool, "purge", 1, &owner("mine")).await.unwrap();
    CronJobLockRepo::mark_failed_run(&pool, "purge", 42, "task was not started")
        .await
        .unwrap();

    assert_eq!(CronJobLockRepo::force_release(&pool, "purge").await.unwrap(), 1);
    let row = CronJobLockRepo::find_by_name(&pool, "purge").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.last_failed_run, 42);
    assert_eq!(row.last_failed_run_message, "task was not started");
}
