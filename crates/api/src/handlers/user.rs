//! Handlers for the `/user` resource.

use axum::extract::State;
use axum::Json;
use sourcegate_core::error::CoreError;

use crate::auth::jwt::AccessToken;
use crate::auth::{AuthMethod, AuthUser};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/user
///
/// The identity the request authenticated as.
pub async fn current_user(user: AuthUser) -> AppResult<Json<DataResponse<AuthUser>>> {
    Ok(Json(DataResponse { data: user }))
}

/// POST /api/v1/user/token
///
/// Trade HTTP Basic credentials for a short-lived bearer token so clients
/// stop sending the password on every request.
pub async fn issue_token(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<AccessToken>>> {
    if user.method != AuthMethod::Basic {
        return Err(AppError::Core(CoreError::Forbidden(
            "Access tokens are only issued for password logins".into(),
        )));
    }

    let token = state
        .auth
        .issue_token(&user)
        .map_err(|e| AppError::InternalError(format!("sign access token: {e}")))?
        .ok_or_else(|| AppError::Unavailable("Local access tokens are not configured".into()))?;

    tracing::info!(user = %user.login_name, "Access token issued");
    Ok(Json(DataResponse { data: token }))
}
