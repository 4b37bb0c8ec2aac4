//! Inbound request authentication.
//!
//! [`Authenticator`] runs the identity-provider proxy first when it is
//! enabled and falls back to the [`basic::BasicChain`] for requests that
//! carry no IAM token.

pub mod basic;
pub mod claims;
pub mod error;
pub mod iam;
pub mod jwt;
pub mod password;
pub mod privileger;
pub mod privileges;
pub mod roles;
pub mod store;

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use sourcegate_core::roles::Role;
use sourcegate_core::types::DbId;
use sourcegate_db::models::user::User;

pub use error::AuthError;

use basic::BasicChain;
use iam::IamProxy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Iam,
    Token,
    Basic,
}

/// Authenticated identity attached to the request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: DbId,
    pub login_name: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub method: AuthMethod,
}

impl AuthUser {
    fn from_user(user: User, method: AuthMethod) -> Self {
        Self {
            user_id: user.id,
            role: if user.is_admin { Role::Admin } else { Role::User },
            login_name: user.login_name,
            name: user.name,
            email: user.email,
            method,
        }
    }
}

pub struct Authenticator {
    iam: Option<IamProxy>,
    basic: BasicChain,
}

impl Authenticator {
    /// `iam` is `None` when the identity-provider proxy is disabled.
    pub fn new(iam: Option<IamProxy>, basic: BasicChain) -> Self {
        Self { iam, basic }
    }

    pub fn iam_enabled(&self) -> bool {
        self.iam.is_some()
    }

    /// Exchange an authenticated identity for a local access token.
    pub fn issue_token(
        &self,
        user: &AuthUser,
    ) -> Result<Option<jwt::AccessToken>, jsonwebtoken::errors::Error> {
        self.basic.issue_token(user.user_id, user.role)
    }

    /// `Ok(None)` for anonymous requests.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        remote_addr: &str,
    ) -> Result<Option<AuthUser>, AuthError> {
        if let Some(iam) = &self.iam {
            match iam.verify(headers, remote_addr).await {
                Ok(user) => return Ok(Some(AuthUser::from_user(user, AuthMethod::Iam))),
                Err(AuthError::IncorrectTokenType) => {}
                Err(e) => return Err(e),
            }
        }

        let method = if headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "))
        {
            AuthMethod::Basic
        } else {
            AuthMethod::Token
        };
        Ok(self
            .basic
            .authenticate(headers)
            .await?
            .map(|user| AuthUser::from_user(user, method)))
    }
}

/// Shared handle stored in the application state.
pub type SharedAuthenticator = Arc<Authenticator>;
