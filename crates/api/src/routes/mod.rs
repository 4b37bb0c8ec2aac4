pub mod admin;
pub mod health;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /user                                  current identity (auth required)
/// /user/token                            bearer token for Basic logins (POST)
///
/// /admin/cron                            list tasks (admin only)
/// /admin/cron/{name}/run                 run now (POST)
/// /admin/cron/{name}/unlock              force unlock (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(user::router())
        .nest("/admin", admin::router())
}
