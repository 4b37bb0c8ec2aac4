//! Handlers for the `/admin/cron` resource.
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sourcegate_audit::Actor;
use sourcegate_cron::{TaskSnapshot, Trigger};

use crate::error::AppResult;
use crate::middleware::auth::ClientAddr;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Acknowledgement for manual task actions.
#[derive(Debug, Serialize)]
pub struct TaskAction {
    pub task: String,
    pub action: &'static str,
}

/// GET /api/v1/admin/cron
///
/// Every registered task with its local run state and lock row.
pub async fn list_tasks(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<TaskSnapshot>>>> {
    let tasks = state.cron.snapshots().await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// POST /api/v1/admin/cron/{name}/run
///
/// Start a run in the background. The run still has to win the lock.
pub async fn run_task(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientAddr(remote_addr): ClientAddr,
    Path(name): Path<String>,
) -> AppResult<(StatusCode, Json<DataResponse<TaskAction>>)> {
    let trigger = Trigger::user(Actor::new(&admin.name, admin.user_id), remote_addr);
    let _run = state.cron.run_now(&name, trigger)?;
    tracing::info!(task = %name, user = %admin.login_name, "Cron task started manually");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: TaskAction {
                task: name,
                action: "run",
            },
        }),
    ))
}

/// POST /api/v1/admin/cron/{name}/unlock
///
/// Clear the lock row regardless of which replica holds it.
pub async fn unlock_task(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientAddr(remote_addr): ClientAddr,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<TaskAction>>> {
    let actor = Actor::new(&admin.name, admin.user_id);
    state.cron.force_unlock(&name, &actor, &remote_addr).await?;
    Ok(Json(DataResponse {
        data: TaskAction {
            task: name,
            action: "unlock",
        },
    }))
}
