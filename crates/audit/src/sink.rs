//! Process-wide audit sink.
//!
//! Records are serialized on the caller's thread. The console copy is
//! printed immediately; the file copy goes through a lossy
//! [`tracing_appender::non_blocking`] queue to a worker thread that owns the
//! [`RotatingFile`]. A full queue drops the record with a log line rather
//! than blocking the caller.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::event::EventKind;
use crate::message::{Actor, AuditRecord, Params, Status};
use crate::writer::{Retention, RotatingFile};

/// Where the console copy of each record goes.
#[derive(Clone, Default)]
pub enum Console {
    #[default]
    Stdout,
    /// Collects lines in memory.
    Memory(Arc<Mutex<Vec<String>>>),
    Discard,
}

impl Console {
    fn print(&self, line: &str) {
        match self {
            Console::Stdout => println!("{line}"),
            Console::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
            Console::Discard => {}
        }
    }
}

struct FileSide {
    writer: NonBlocking,
    guard: Mutex<Option<WorkerGuard>>,
    retention: Retention,
}

struct Inner {
    file: Option<FileSide>,
    journal: Option<Arc<Mutex<Vec<String>>>>,
    console: Console,
}

/// Cheaply cloneable handle to the audit pipeline.
#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<Inner>,
}

impl AuditSink {
    /// Open the audit file and start the writer thread.
    pub fn start(config: &AuditConfig) -> Result<Self, AuditError> {
        let file = RotatingFile::open(&config.dir, &config.file_name, config.rotation.clone())
            .map_err(|source| AuditError::Open {
                path: config.file_path(),
                source,
            })?;
        let retention = file.retention();

        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(config.queue_capacity.max(1))
            .lossy(true)
            .thread_name("audit-writer")
            .finish(file);

        tracing::info!(path = %config.file_path().display(), "Audit sink started");

        Ok(Self {
            inner: Arc::new(Inner {
                file: Some(FileSide {
                    writer,
                    guard: Mutex::new(Some(guard)),
                    retention,
                }),
                journal: None,
                console: Console::Stdout,
            }),
        })
    }

    /// Sink whose file side is an in-memory journal of serialized records.
    pub fn memory() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            inner: Arc::new(Inner {
                file: None,
                journal: Some(lines.clone()),
                console: Console::Discard,
            }),
        };
        (sink, lines)
    }

    /// Sink that drops everything.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Inner {
                file: None,
                journal: None,
                console: Console::Discard,
            }),
        }
    }

    /// Replace the console destination. Only valid before the handle is cloned.
    pub fn with_console(self, console: Console) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Self {
                inner: Arc::new(Inner {
                    file: inner.file,
                    journal: inner.journal,
                    console,
                }),
            },
            Err(inner) => {
                tracing::warn!("Audit console cannot be replaced on a shared sink");
                Self { inner }
            }
        }
    }

    /// Write an event to the audit file and stdout.
    pub fn emit(
        &self,
        kind: EventKind,
        actor: &Actor,
        status: Status,
        remote_addr: &str,
        params: Params,
    ) {
        if let Some(record) = AuditRecord::new(kind, actor, status, remote_addr, params) {
            self.record(&record, true);
        }
    }

    /// Write an event to the audit file only.
    pub fn emit_to_file_only(
        &self,
        kind: EventKind,
        actor: &Actor,
        status: Status,
        remote_addr: &str,
        params: Params,
    ) {
        if let Some(record) = AuditRecord::new(kind, actor, status, remote_addr, params) {
            self.record(&record, false);
        }
    }

    fn record(&self, record: &AuditRecord, to_console: bool) {
        let line = match record.to_json() {
            Ok(line) => line,
            Err(e) => {
                let err = AuditError::Marshal(e.to_string());
                tracing::error!(id = %record.id, error = %err, "Audit record dropped");
                return;
            }
        };

        if let Some(journal) = &self.inner.journal {
            if let Ok(mut journal) = journal.lock() {
                journal.push(line.clone());
            }
        }

        if let Some(file) = &self.inner.file {
            let mut writer = file.writer.clone();
            let dropped = writer.error_counter().dropped_lines();
            let written = writer.write_all(format!("{line}\n").as_bytes());
            if written.is_err() || writer.error_counter().dropped_lines() > dropped {
                tracing::warn!(id = %record.id, "Audit queue full or writer stopped, record dropped");
            }
        }

        if to_console {
            self.inner.console.print(&line);
        }
    }

    /// Remove rotated files past retention.
    pub async fn purge_expired(&self) {
        let Some(file) = &self.inner.file else { return };
        let retention = file.retention.clone();
        match tokio::task::spawn_blocking(move || retention.purge_expired()).await {
            Ok(Ok(removed)) => tracing::info!(removed, "Purged expired audit files"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to purge audit files"),
            Err(e) => tracing::error!(error = %e, "Audit purge task failed"),
        }
    }

    /// Drain the queue to disk and stop the writer thread. Later records
    /// are dropped.
    pub async fn shutdown(&self) {
        let Some(file) = &self.inner.file else { return };
        let guard = match file.guard.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(guard) = guard {
            // Dropping the guard blocks until the worker has flushed.
            if let Err(e) = tokio::task::spawn_blocking(move || drop(guard)).await {
                tracing::error!(error = %e, "Audit writer did not stop cleanly");
            }
            tracing::info!("Audit sink stopped");
        }
    }
}
