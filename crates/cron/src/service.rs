//! Local scheduler driving registered tasks.
//!
//! Each enabled task gets one loop that sleeps until its next fire time and
//! then runs the lock protocol. The loops stop when the service token is
//! cancelled; running actions observe the same cancellation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use sourcegate_audit::{Actor, AuditSink, EventKind, Status};
use sourcegate_db::models::cron_lock::CronJobLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CronConfig;
use crate::error::CronError;
use crate::registry::LockRegistry;
use crate::task::{RunOutcome, Task, TaskState, Trigger};

/// Combined view of a task for the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub run_at_start: bool,
    pub state: TaskState,
    pub lock: Option<CronJobLock>,
}

pub struct CronService {
    config: CronConfig,
    registry: LockRegistry,
    audit: AuditSink,
    tasks: BTreeMap<String, Arc<Task>>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CronService {
    pub fn new(config: CronConfig, registry: LockRegistry, audit: AuditSink) -> Self {
        Self {
            config,
            registry,
            audit,
            tasks: BTreeMap::new(),
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Add a task and create its lock row when enabled.
    pub async fn register(&mut self, task: Task) -> Result<(), CronError> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(CronError::Duplicate(name));
        }

        if task.config().enabled {
            if let Err(e) = self.registry.register(&name, task.next_fire()).await {
                let mut audit_params = task.audit_params();
                audit_params.insert("error".into(), e.to_string());
                self.audit.emit(
                    EventKind::CronTaskRegistered,
                    &Actor::cron(),
                    Status::Failure,
                    "-",
                    audit_params,
                );
                return Err(e);
            }
        }

        self.audit.emit(
            EventKind::CronTaskRegistered,
            &Actor::cron(),
            Status::Success,
            "-",
            task.audit_params(),
        );
        tracing::info!(
            task = %name,
            schedule = task.schedule().as_str(),
            enabled = task.config().enabled,
            "Cron task registered"
        );
        self.tasks.insert(name, Arc::new(task));
        Ok(())
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// Spawn one scheduling loop per enabled task.
    pub fn start(&self) {
        if !self.config.enabled {
            tracing::info!("Cron scheduler disabled");
            return;
        }

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for task in self.tasks.values().filter(|t| t.config().enabled) {
            handles.push(tokio::spawn(schedule_loop(
                Arc::clone(task),
                self.registry.clone(),
                self.audit.clone(),
                self.config.clone(),
                self.cancel.clone(),
            )));
        }
        tracing::info!(tasks = handles.len(), "Cron scheduler started");
    }

    /// Run `name` once in the background on behalf of `trigger`.
    pub fn run_now(&self, name: &str, trigger: Trigger) -> Result<JoinHandle<RunOutcome>, CronError> {
        let task = self
            .tasks
            .get(name)
            .cloned()
            .ok_or_else(|| CronError::NotRegistered(name.to_string()))?;
        if !task.config().enabled {
            return Err(CronError::Disabled(name.to_string()));
        }

        let registry = self.registry.clone();
        let audit = self.audit.clone();
        let cancel = self.cancel.clone();
        let check_delay = self.config.check_delay_unlocked;
        Ok(tokio::spawn(async move {
            task.run(&trigger, &registry, &audit, &cancel, check_delay).await
        }))
    }

    /// Clear the lock of `name` regardless of owner.
    pub async fn force_unlock(&self, name: &str, actor: &Actor, remote_addr: &str) -> Result<(), CronError> {
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| CronError::NotRegistered(name.to_string()))?;

        let result = self.registry.force_unlock(name).await;
        let mut audit_params = task.audit_params();
        if let Err(e) = &result {
            audit_params.insert("error".into(), e.to_string());
        }
        self.audit.emit(
            EventKind::CronTaskUnlock,
            actor,
            Status::from_ok(result.is_ok()),
            remote_addr,
            audit_params,
        );
        result?;
        tracing::info!(task = name, user = %actor.name, "Cron lock force-released");
        Ok(())
    }

    pub async fn snapshots(&self) -> Result<Vec<TaskSnapshot>, CronError> {
        let mut locks: BTreeMap<String, CronJobLock> = self
            .registry
            .list()
            .await?
            .into_iter()
            .map(|row| (row.name.clone(), row))
            .collect();

        Ok(self
            .tasks
            .values()
            .map(|task| TaskSnapshot {
                name: task.name().to_string(),
                schedule: task.schedule().as_str().to_string(),
                enabled: task.config().enabled,
                run_at_start: task.config().run_at_start,
                state: task.state(),
                lock: locks.remove(task.name()),
            })
            .collect())
    }

    /// Stop every scheduling loop and wait for running actions to return.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Cron task loop ended abnormally");
            }
        }
        tracing::info!("Cron scheduler stopped");
    }
}

async fn schedule_loop(
    task: Arc<Task>,
    registry: LockRegistry,
    audit: AuditSink,
    config: CronConfig,
    cancel: CancellationToken,
) {
    if task.config().run_at_start {
        task.run(&Trigger::scheduler(), &registry, &audit, &cancel, config.check_delay_unlocked)
            .await;
    }

    loop {
        let now = Utc::now();
        let Some(next) = task.schedule().next_after(now) else {
            tracing::warn!(task = task.name(), "Cron schedule has no further fire times");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                task.run(&Trigger::scheduler(), &registry, &audit, &cancel, config.check_delay_unlocked)
                    .await;
            }
        }
    }
    tracing::debug!(task = task.name(), "Cron task loop stopped");
}
