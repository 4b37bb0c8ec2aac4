//! Authentication chain used when the identity provider is not in front.
//!
//! Methods are tried in order: a locally issued bearer token, then HTTP
//! Basic against the stored argon2 hash. The first method whose scheme
//! matches decides the request.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sourcegate_core::roles::Role;
use sourcegate_core::types::DbId;
use sourcegate_db::models::user::User;

use super::error::AuthError;
use super::jwt::{generate_access_token, validate_token, AccessToken, JwtConfig};
use super::password::verify_password;
use super::store::IdentityStore;

pub struct BasicChain {
    jwt: JwtConfig,
    identities: Arc<dyn IdentityStore>,
}

impl BasicChain {
    pub fn new(jwt: JwtConfig, identities: Arc<dyn IdentityStore>) -> Self {
        Self { jwt, identities }
    }

    /// `Ok(None)` when no method recognizes the request.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<User>, AuthError> {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        let Some((scheme, credentials)) = value.split_once(' ') else {
            return Ok(None);
        };

        match scheme {
            "Bearer" if self.jwt.is_configured() => self.bearer(credentials.trim()).await.map(Some),
            "Basic" => self.basic(credentials.trim()).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Sign an access token for `user_id`. `Ok(None)` when no signing
    /// secret is configured.
    pub fn issue_token(
        &self,
        user_id: DbId,
        role: Role,
    ) -> Result<Option<AccessToken>, jsonwebtoken::errors::Error> {
        if !self.jwt.is_configured() {
            return Ok(None);
        }
        let access_token = generate_access_token(user_id, role, &self.jwt)?;
        Ok(Some(AccessToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.jwt.access_token_expiry_mins * 60,
        }))
    }

    async fn bearer(&self, token: &str) -> Result<User, AuthError> {
        let claims = validate_token(token, &self.jwt)
            .map_err(|e| AuthError::InvalidCredentials(format!("access token: {e}")))?;
        let user = self.identities.find_by_id(claims.sub).await?;
        active(user)
    }

    async fn basic(&self, credentials: &str) -> Result<User, AuthError> {
        let decoded = STANDARD
            .decode(credentials)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or_else(|| AuthError::InvalidCredentials("malformed basic credentials".into()))?;
        let (login, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::InvalidCredentials("malformed basic credentials".into()))?;

        let user = active(self.identities.find_by_login_name(login).await?)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AuthError::InvalidCredentials("password login not available".into()))?;
        match verify_password(password, hash) {
            Ok(true) => Ok(user),
            Ok(false) => Err(AuthError::InvalidCredentials("wrong password".into())),
            Err(e) => {
                tracing::warn!(user = %user.login_name, error = %e, "Stored password hash is unreadable");
                Err(AuthError::InvalidCredentials("wrong password".into()))
            }
        }
    }
}

fn active(user: Option<User>) -> Result<User, AuthError> {
    user.filter(|u| u.is_active)
        .ok_or_else(|| AuthError::InvalidCredentials("unknown user".into()))
}
