//! Request authentication layer.
//!
//! Installed with [`axum::middleware::from_fn_with_state`] in front of the
//! `/api/v1` routes. A resolved identity is stored in the request extensions
//! where the [`AuthUser`] extractor finds it; anonymous requests pass
//! through and are rejected by extractors that need an identity.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, OriginalUri, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use sourcegate_audit::{params, Actor, EventKind, Status};
use sourcegate_core::error::CoreError;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Caller address as `ip:port`, bare IP or `-`.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

/// Resolve the caller address. The first `X-Forwarded-For` entry is used
/// only when `trust_forwarded_for` is set; otherwise the socket peer.
fn client_addr(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(forwarded) = forwarded.filter(|_| trust_forwarded_for) {
        return forwarded.to_string();
    }
    peer.map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let remote_addr = client_addr(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.config.trust_forwarded_for,
    );

    match state.auth.authenticate(request.headers(), &remote_addr).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => {
            let request_url = request
                .extensions()
                .get::<OriginalUri>()
                .map(|OriginalUri(uri)| uri.to_string())
                .unwrap_or_else(|| request.uri().to_string());
            tracing::warn!(uri = %request_url, error = %e, "Request authentication failed");
            state.audit.emit(
                EventKind::UnauthorizedRequest,
                &Actor::anonymous(),
                Status::Failure,
                &remote_addr,
                params([
                    ("request_url", request_url),
                    ("error", e.to_string()),
                ]),
            );
            return Err(e.into());
        }
    }

    request.extensions_mut().insert(ClientAddr(remote_addr));
    Ok(next.run(request).await)
}

/// Authenticated caller. Use as a handler argument to require authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Authentication required".into()))
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ClientAddr>()
            .cloned()
            .unwrap_or_else(|| ClientAddr("-".to_string())))
    }
}
