//! One schedulable task and its run protocol.
//!
//! A run takes the lock row under a fresh process UUID, starts a watchdog
//! that cancels the action if the row changes hands, executes the action,
//! and releases the row with the next fire time and a terminal status.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use sourcegate_audit::{params, Actor, AuditSink, EventKind, Params, Status};
use sourcegate_db::models::cron_lock::CronLockStatus;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TaskConfig;
use crate::error::CronError;
use crate::registry::LockRegistry;
use crate::schedule::Schedule;

type Action = dyn Fn(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// In-process view of the last run, independent of the lock row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskState {
    pub status: Option<CronLockStatus>,
    pub last_message: String,
    pub exec_times: u64,
    pub last_doer: String,
}

/// How a single run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run holds the lock; the action did not execute.
    Skipped,
    Finished,
    Cancelled,
    Failed(String),
}

impl RunOutcome {
    fn lock_status(&self) -> CronLockStatus {
        match self {
            RunOutcome::Finished | RunOutcome::Skipped => CronLockStatus::Finished,
            RunOutcome::Cancelled => CronLockStatus::Cancelled,
            RunOutcome::Failed(_) => CronLockStatus::Error,
        }
    }
}

/// Who started a run. Every audit record of the run names this actor.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub actor: Actor,
    pub remote_addr: String,
}

impl Trigger {
    /// A fire of the local schedule.
    pub fn scheduler() -> Self {
        Self {
            actor: Actor::cron(),
            remote_addr: "-".to_string(),
        }
    }

    /// A run requested by a user, e.g. through the admin API.
    pub fn user(actor: Actor, remote_addr: impl Into<String>) -> Self {
        Self {
            actor,
            remote_addr: remote_addr.into(),
        }
    }
}

pub struct Task {
    name: String,
    config: TaskConfig,
    schedule: Schedule,
    action: Box<Action>,
    state: Mutex<TaskState>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Task {
    /// Build a task. The schedule in `config` is validated here.
    pub fn new<F, Fut>(name: &str, config: TaskConfig, action: F) -> Result<Self, CronError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let schedule = Schedule::parse(name, &config.schedule)?;
        Ok(Self {
            name: name.to_string(),
            config,
            schedule,
            action: Box::new(move |cancel| action(cancel).boxed()),
            state: Mutex::new(TaskState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> TaskState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Unix time of the next fire after now, `0` if the schedule never fires again.
    pub fn next_fire(&self) -> i64 {
        self.schedule
            .next_after(Utc::now())
            .map(|t| t.timestamp())
            .unwrap_or(0)
    }

    /// Audit parameters describing this task.
    pub fn audit_params(&self) -> Params {
        params([
            ("task_name", self.name.clone()),
            ("enabled", self.config.enabled.to_string()),
            ("run_at_start", self.config.run_at_start.to_string()),
            ("schedule", self.schedule.as_str().to_string()),
        ])
    }

    fn audit(
        &self,
        audit: &AuditSink,
        trigger: &Trigger,
        kind: EventKind,
        status: Status,
        error: Option<&str>,
    ) {
        let mut audit_params = self.audit_params();
        if let Some(error) = error {
            audit_params.insert("error".into(), error.to_string());
        }
        audit.emit(kind, &trigger.actor, status, &trigger.remote_addr, audit_params);
    }

    /// Execute one run under the distributed lock.
    ///
    /// `parent` cancels the action on shutdown; `check_delay` is the
    /// watchdog poll interval.
    pub async fn run(
        &self,
        trigger: &Trigger,
        registry: &LockRegistry,
        audit: &AuditSink,
        parent: &CancellationToken,
        check_delay: Duration,
    ) -> RunOutcome {
        let process_uuid = Uuid::new_v4().to_string();
        let started = Utc::now().timestamp();

        if let Err(e) = registry.lock(&self.name, started, &process_uuid).await {
            let message = e.to_string();
            match e {
                CronError::AlreadyLocked { .. } => {
                    tracing::info!(task = %self.name, "Cron task locked by another run, skipping")
                }
                _ => tracing::error!(task = %self.name, error = %e, "Failed to lock cron task"),
            }
            self.audit(audit, trigger, EventKind::CronTaskLock, Status::Failure, Some(&message));
            return RunOutcome::Skipped;
        }

        self.audit(audit, trigger, EventKind::CronTaskLock, Status::Success, None);
        self.audit(audit, trigger, EventKind::CronTaskRun, Status::Success, None);
        self.set_state(|state| {
            state.status = Some(CronLockStatus::Process);
            state.last_doer = trigger.actor.name.clone();
        });
        tracing::info!(task = %self.name, doer = %trigger.actor.name, "Cron task started");

        let cancel = parent.child_token();
        let watchdog_done = CancellationToken::new();
        let watchdog = tokio::spawn(watch_lock(
            registry.clone(),
            self.name.clone(),
            process_uuid.clone(),
            check_delay,
            cancel.clone(),
            watchdog_done.clone(),
        ));

        let result = AssertUnwindSafe((self.action)(cancel.clone()))
            .catch_unwind()
            .await;
        watchdog_done.cancel();
        let _ = watchdog.await;

        let outcome = match result {
            Ok(Ok(())) if cancel.is_cancelled() => RunOutcome::Cancelled,
            Ok(Ok(())) => RunOutcome::Finished,
            Ok(Err(_)) if cancel.is_cancelled() => RunOutcome::Cancelled,
            Ok(Err(e)) => RunOutcome::Failed(format!("{e:#}")),
            Err(panic) => RunOutcome::Failed(panic_message(panic.as_ref())),
        };

        if outcome == RunOutcome::Cancelled {
            self.audit(audit, trigger, EventKind::CronTaskCancel, Status::Success, None);
        }

        let next = self.next_fire();
        match registry
            .unlock(&self.name, next, outcome.lock_status(), &process_uuid)
            .await
        {
            Ok(0) => tracing::warn!(task = %self.name, "Cron task stopped, lock was taken over"),
            Ok(_) => self.audit(audit, trigger, EventKind::CronTaskUnlock, Status::Success, None),
            Err(e) => {
                tracing::error!(task = %self.name, error = %e, "Failed to unlock cron task");
                let message = e.to_string();
                self.audit(audit, trigger, EventKind::CronTaskUnlock, Status::Failure, Some(&message));
            }
        }

        let error = match &outcome {
            RunOutcome::Failed(message) => Some(message.as_str()),
            _ => None,
        };
        self.audit(
            audit,
            trigger,
            EventKind::CronTaskFinished,
            Status::from_ok(error.is_none()),
            error,
        );

        self.set_state(|state| {
            state.status = Some(outcome.lock_status());
            state.last_message = error.unwrap_or_default().to_string();
            state.exec_times += 1;
        });
        match &outcome {
            RunOutcome::Failed(message) => {
                tracing::error!(task = %self.name, error = %message, "Cron task failed")
            }
            other => tracing::info!(task = %self.name, outcome = ?other, "Cron task ended"),
        }
        outcome
    }

    fn set_state(&self, f: impl FnOnce(&mut TaskState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }
}

/// Cancel `cancel` once the lock row no longer carries `process_uuid`.
async fn watch_lock(
    registry: LockRegistry,
    name: String,
    process_uuid: String,
    check_delay: Duration,
    cancel: CancellationToken,
    done: CancellationToken,
) {
    let mut interval = tokio::time::interval(check_delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            _ = interval.tick() => {
                match registry.get(&name).await {
                    Ok(Some(row)) if row.locked && row.process_uuid == process_uuid => {}
                    Ok(_) => {
                        tracing::warn!(task = %name, "Cron lock lost, cancelling task");
                        cancel.cancel();
                        break;
                    }
                    Err(e) => tracing::error!(task = %name, error = %e, "Cron watchdog failed to read lock"),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
