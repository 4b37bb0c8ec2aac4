//! Locally issued HS256 access tokens.
//!
//! Used by the basic authentication chain when the identity provider is not
//! in front of the service. IAM tokens are handled in [`super::claims`].

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sourcegate_core::config::Settings;
use sourcegate_core::error::CoreError;
use sourcegate_core::roles::Role;
use sourcegate_core::types::DbId;

pub const SECTION: &str = "auth";

/// Claims embedded in every local access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Local user id.
    pub sub: DbId,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret. Empty until resolved from config or the secret store.
    pub secret: String,
    pub access_token_expiry_mins: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

impl JwtConfig {
    /// | Key                      | Default |
    /// |--------------------------|---------|
    /// | `JWT_SECRET`             | none    |
    /// | `JWT_ACCESS_EXPIRY_MINS` | `15`    |
    ///
    /// The secret may instead come from `[sourcecontrol.vault.oauth2]`.
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let section = settings.section(SECTION);
        Ok(Self {
            secret: section.string_or("JWT_SECRET", ""),
            access_token_expiry_mins: section
                .parse_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }
}

/// Response body of a token exchange.
#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

pub fn generate_access_token(
    user_id: DbId,
    role: Role,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role,
        exp: now + config.access_token_expiry_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate signature and expiry of a local access token.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
