//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::cron;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET    /cron                    -> list_tasks
/// POST   /cron/{name}/run         -> run_task
/// POST   /cron/{name}/unlock      -> unlock_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cron", get(cron::list_tasks))
        .route("/cron/{name}/run", post(cron::run_task))
        .route("/cron/{name}/unlock", post(cron::unlock_task))
}
