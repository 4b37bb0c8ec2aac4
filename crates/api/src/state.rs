use std::sync::Arc;

use sourcegate_audit::AuditSink;
use sourcegate_cron::CronService;
use sourcegate_events::EventEmitter;

use crate::auth::Authenticator;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool. `None` only in tests without a database.
    pub pool: Option<sourcegate_db::DbPool>,
    pub config: Arc<ServerConfig>,
    pub auth: Arc<Authenticator>,
    pub cron: Arc<CronService>,
    pub events: Arc<EventEmitter>,
    pub audit: AuditSink,
}
