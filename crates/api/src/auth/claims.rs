//! Identity-provider tokens.
//!
//! The signature is not checked here: trust terminates at the reverse proxy
//! in front of the service. Only tokens declaring `RS256` are accepted.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::error::AuthError;

const BEARER: &str = "Bearer";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IamClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub preferred_username: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub given_name: String,
    /// Tenant name.
    #[serde(default)]
    pub organization: String,
    pub groups: Option<Vec<String>>,
}

impl IamClaims {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.family_name, self.given_name)
    }

    /// Groups, or `None` when the claim is absent or carries no usable entry.
    pub fn groups(&self) -> Option<&[String]> {
        self.groups
            .as_deref()
            .filter(|groups| groups.first().is_some_and(|g| !g.is_empty()))
    }
}

/// Extract the raw token from `Authorization: Bearer <jwt>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::IncorrectTokenType)?;

    let parts: Vec<&str> = value.split(' ').collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(AuthError::ParseIamJwt("bad authorization header".into()));
    };
    if *scheme != BEARER {
        return Err(AuthError::IncorrectTokenType);
    }
    Ok(*token)
}

/// Decode claims without verifying the signature.
pub fn parse_unverified(token: &str) -> Result<IamClaims, AuthError> {
    let header = decode_header(token).map_err(|e| AuthError::ParseIamJwt(e.to_string()))?;
    if header.alg != Algorithm::RS256 {
        return Err(AuthError::ParseIamJwt(format!(
            "signing method {:?} is invalid",
            header.alg
        )));
    }

    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = decode::<IamClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::ParseIamJwt(e.to_string()))?
        .claims;

    for (name, value) in [
        ("sub", &claims.sub),
        ("email", &claims.email),
        ("preferred_username", &claims.preferred_username),
        ("family_name", &claims.family_name),
        ("given_name", &claims.given_name),
    ] {
        if value.is_empty() {
            return Err(AuthError::ParseIamJwt(format!("claim {name} does not exist")));
        }
    }
    Ok(claims)
}
