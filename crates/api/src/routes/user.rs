//! Route definitions for the `/user` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::user;
use crate::state::AppState;

/// ```text
/// GET    /user                    -> current_user
/// POST   /user/token              -> issue_token
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(user::current_user))
        .route("/user/token", post(user::issue_token))
}
