//! Task protocol and scheduler service against the in-memory lock store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::Value;
use sourcegate_audit::{Actor, AuditSink};
use sourcegate_cron::{
    CronConfig, CronError, CronService, LockRegistry, MemoryCronLockStore, RunOutcome, Task,
    TaskConfig, Trigger,
};
use sourcegate_core::types::now_unix;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CHECK_DELAY: Duration = Duration::from_millis(20);

fn registry() -> LockRegistry {
    LockRegistry::with_host(Arc::new(MemoryCronLockStore::new()), "node-a", "10.0.0.1")
}

fn events(journal: &Arc<Mutex<Vec<String>>>) -> Vec<Value> {
    journal
        .lock()
        .unwrap()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn of_kind<'a>(events: &'a [Value], description: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["event"] == description).collect()
}

fn counting_task(name: &str, counter: Arc<AtomicUsize>, hold: Duration) -> Task {
    Task::new(name, TaskConfig::new("0 3 * * *"), move |_cancel| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            Ok(())
        }
    })
    .unwrap()
}

// ---------------------------------------------------------------------------
// Run protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_fires_execute_once() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let counter = Arc::new(AtomicUsize::new(0));
    let task = Arc::new(counting_task("purge", counter.clone(), Duration::from_millis(200)));
    registry.register("purge", task.next_fire()).await.unwrap();
    let cancel = CancellationToken::new();

    let first = {
        let (task, registry, audit, cancel) =
            (task.clone(), registry.clone(), audit.clone(), cancel.clone());
        tokio::spawn(async move { task.run(&Trigger::scheduler(), &registry, &audit, &cancel, CHECK_DELAY).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let row = registry.get("purge").await.unwrap().unwrap();
    assert_eq!(row.status, "process");

    let second = task.run(&Trigger::scheduler(), &registry, &audit, &cancel, CHECK_DELAY).await;
    assert_eq!(second, RunOutcome::Skipped);
    assert_eq!(first.await.unwrap(), RunOutcome::Finished);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let row = registry.get("purge").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.status, "finished");
    assert_eq!(row.next, task.next_fire());

    let events = events(&journal);
    let locks = of_kind(&events, "Lock cron task");
    assert_eq!(locks.len(), 2);
    assert_eq!(locks.iter().filter(|e| e["status"] == "FAIL").count(), 1);
    assert_eq!(of_kind(&events, "Run cron task").len(), 1);
    assert_eq!(of_kind(&events, "Unlock cron task").len(), 1);
    let finished = of_kind(&events, "Finish cron task");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0]["status"], "SUCCESS");
    assert_eq!(finished[0]["username"], "(Cron)");
    assert_eq!(finished[0]["task_name"], "purge");
    assert_eq!(task.state().exec_times, 1);
}

#[tokio::test]
async fn failing_action_records_error() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let task = Task::new("sync", TaskConfig::new("*/5 * * * *"), |_cancel| async {
        anyhow::bail!("upstream refused")
    })
    .unwrap();
    registry.register("sync", 0).await.unwrap();

    let outcome = task
        .run(&Trigger::scheduler(), &registry, &audit, &CancellationToken::new(), CHECK_DELAY)
        .await;
    assert_matches!(outcome, RunOutcome::Failed(ref m) if m.contains("upstream refused"));

    let row = registry.get("sync").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.status, "error");

    let events = events(&journal);
    let finished = of_kind(&events, "Finish cron task");
    assert_eq!(finished[0]["status"], "FAIL");
    assert!(finished[0]["error"].as_str().unwrap().contains("upstream refused"));
    assert_eq!(task.state().last_message, "upstream refused");
}

#[tokio::test]
async fn panicking_action_still_releases_lock() {
    let registry = registry();
    let task = Task::new("boom", TaskConfig::new("@hourly"), |_cancel| async {
        if now_unix() > 0 {
            panic!("kaboom");
        }
        Ok(())
    })
    .unwrap();
    registry.register("boom", 0).await.unwrap();

    let outcome = task
        .run(&Trigger::scheduler(), &registry, &AuditSink::disabled(), &CancellationToken::new(), CHECK_DELAY)
        .await;
    assert_eq!(outcome, RunOutcome::Failed("panic: kaboom".into()));
    let row = registry.get("boom").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.status, "error");
}

#[tokio::test]
async fn watchdog_cancels_when_lock_is_taken_over() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let task = Arc::new(
        Task::new("long", TaskConfig::new("@daily"), |cancel: CancellationToken| async move {
            cancel.cancelled().await;
            Ok(())
        })
        .unwrap(),
    );
    registry.register("long", 0).await.unwrap();

    let run = {
        let (task, registry, audit) = (task.clone(), registry.clone(), audit.clone());
        tokio::spawn(async move {
            task.run(&Trigger::scheduler(), &registry, &audit, &CancellationToken::new(), CHECK_DELAY)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    registry.force_unlock("long").await.unwrap();
    registry.lock("long", now_unix(), "thief").await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("watchdog should cancel the action")
        .unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);

    let row = registry.get("long").await.unwrap().unwrap();
    assert!(row.locked);
    assert_eq!(row.process_uuid, "thief");

    let events = events(&journal);
    assert_eq!(of_kind(&events, "Cancel cron task").len(), 1);
    assert!(of_kind(&events, "Unlock cron task").is_empty());
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interval_schedules_are_rejected_at_registration() {
    let result = Task::new("bad", TaskConfig::new("@every 1m"), |_cancel| async { Ok(()) });
    assert_matches!(result, Err(CronError::InvalidSchedule { .. }));
}

#[tokio::test]
async fn register_audits_and_rejects_duplicates() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let mut service = CronService::new(CronConfig::default(), registry.clone(), audit);
    let counter = Arc::new(AtomicUsize::new(0));

    service
        .register(counting_task("purge", counter.clone(), Duration::ZERO))
        .await
        .unwrap();
    assert_matches!(
        service
            .register(counting_task("purge", counter, Duration::ZERO))
            .await,
        Err(CronError::Duplicate(_))
    );
    assert!(registry.get("purge").await.unwrap().is_some());

    let events = events(&journal);
    let registered = of_kind(&events, "Registered cron task");
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0]["schedule"], "0 3 * * *");
    assert_eq!(registered[0]["enabled"], "true");
    assert_eq!(registered[0]["run_at_start"], "false");
}

#[tokio::test]
async fn run_now_and_force_unlock() {
    let registry = registry();
    let mut service = CronService::new(CronConfig::default(), registry.clone(), AuditSink::disabled());
    let counter = Arc::new(AtomicUsize::new(0));
    service
        .register(counting_task("purge", counter.clone(), Duration::ZERO))
        .await
        .unwrap();

    let admin = Trigger::user(Actor::new("admin", 1), "127.0.0.1:5000");
    let outcome = service.run_now("purge", admin.clone()).unwrap().await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_matches!(service.run_now("ghost", admin), Err(CronError::NotRegistered(_)));

    registry.lock("purge", now_unix(), "stuck").await.unwrap();
    service
        .force_unlock("purge", &Actor::new("admin", 1), "127.0.0.1:5000")
        .await
        .unwrap();
    assert!(!registry.get("purge").await.unwrap().unwrap().locked);

    let snapshots = service.snapshots().await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state.last_doer, "admin");
    assert_eq!(snapshots[0].lock.as_ref().unwrap().status, "finished");
}

#[tokio::test]
async fn manual_runs_are_audited_under_the_requesting_user() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let mut service = CronService::new(CronConfig::default(), registry, audit);
    service
        .register(counting_task("gc", Arc::new(AtomicUsize::new(0)), Duration::ZERO))
        .await
        .unwrap();

    let trigger = Trigger::user(Actor::new("alice", 7), "10.1.2.3:4455");
    let outcome = service.run_now("gc", trigger).unwrap().await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished);

    let events = events(&journal);
    for description in ["Lock cron task", "Run cron task", "Unlock cron task", "Finish cron task"] {
        let matching = of_kind(&events, description);
        assert_eq!(matching.len(), 1, "{description}");
        assert_eq!(matching[0]["username"], "alice", "{description}");
        assert_eq!(matching[0]["internal_id"], "7", "{description}");
        assert_eq!(matching[0]["user_ip"], "10.1.2.3", "{description}");
    }
}

#[tokio::test]
async fn scheduled_runs_are_audited_under_the_scheduler() {
    let registry = registry();
    let (audit, journal) = AuditSink::memory();
    let task = counting_task("gc", Arc::new(AtomicUsize::new(0)), Duration::ZERO);
    registry.register("gc", 0).await.unwrap();

    task.run(&Trigger::scheduler(), &registry, &audit, &CancellationToken::new(), CHECK_DELAY)
        .await;

    let events = events(&journal);
    let run = of_kind(&events, "Run cron task");
    assert_eq!(run[0]["username"], "(Cron)");
    assert_eq!(run[0]["user_ip"], "-");
}

#[tokio::test]
async fn shutdown_cancels_running_tasks() {
    let registry = registry();
    let mut service = CronService::new(CronConfig::default(), registry.clone(), AuditSink::disabled());
    let started = Arc::new(AtomicUsize::new(0));
    let seen = started.clone();
    let task = Task::new(
        "waiter",
        TaskConfig::new("@yearly").run_at_start(true),
        move |cancel: CancellationToken| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                cancel.cancelled().await;
                Ok(())
            }
        },
    )
    .unwrap();
    service.register(task).await.unwrap();

    service.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);

    tokio::time::timeout(Duration::from_secs(2), service.shutdown())
        .await
        .expect("shutdown should not hang");
    let row = registry.get("waiter").await.unwrap().unwrap();
    assert!(!row.locked);
    assert_eq!(row.status, "cancelled");
}
