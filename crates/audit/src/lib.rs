//! Audit journal for security-relevant actions.
//!
//! Every business operation reports what happened through [`emit`] (audit
//! file and stdout) or [`emit_to_file_only`]. The sink is installed once at
//! startup with [`init`]; before that, and after [`shutdown`], events are
//! dropped with a debug log line.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod sink;
pub mod writer;

use std::sync::OnceLock;

pub use config::AuditConfig;
pub use error::AuditError;
pub use event::EventKind;
pub use message::{params, Actor, AuditRecord, Params, Status};
pub use sink::{AuditSink, Console};

static GLOBAL: OnceLock<AuditSink> = OnceLock::new();

/// Start the file writer and install it as the process-wide sink.
pub fn init(config: &AuditConfig) -> Result<AuditSink, AuditError> {
    let sink = AuditSink::start(config)?;
    install(sink.clone())?;
    Ok(sink)
}

/// Install an already constructed sink as the process-wide one.
pub fn install(sink: AuditSink) -> Result<(), AuditError> {
    GLOBAL.set(sink).map_err(|_| AuditError::AlreadyInstalled)
}

/// Handle to the process-wide sink, or a disabled one if none is installed.
pub fn global() -> AuditSink {
    GLOBAL.get().cloned().unwrap_or_else(AuditSink::disabled)
}

pub fn emit(kind: EventKind, actor: &Actor, status: Status, remote_addr: &str, params: Params) {
    match GLOBAL.get() {
        Some(sink) => sink.emit(kind, actor, status, remote_addr, params),
        None => tracing::debug!(event = kind.description(), "Audit sink not installed"),
    }
}

pub fn emit_to_file_only(
    kind: EventKind,
    actor: &Actor,
    status: Status,
    remote_addr: &str,
    params: Params,
) {
    match GLOBAL.get() {
        Some(sink) => sink.emit_to_file_only(kind, actor, status, remote_addr, params),
        None => tracing::debug!(event = kind.description(), "Audit sink not installed"),
    }
}

/// Flush and stop the process-wide writer.
pub async fn shutdown() {
    if let Some(sink) = GLOBAL.get() {
        sink.shutdown().await;
    }
}
