use axum::http::StatusCode;

/// Reasons an inbound request fails authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token; the next authentication method may still apply.
    #[error("incorrect token type")]
    IncorrectTokenType,

    #[error("parse IAM JWT: {0}")]
    ParseIamJwt(String),

    #[error("role required: token carries no groups while Ws-Privileges are enabled")]
    RoleRequired,

    #[error("roles from groups don't match the configured whitelists")]
    RoleMismatch,

    #[error("parse privileges: {0}")]
    ParsePrivileges(String),

    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("organizations not found: {0}")]
    OrganizationNotFound(String),

    #[error("apply privileges: {0}")]
    ApplyPrivileges(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("identity store: {0}")]
    Store(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::IncorrectTokenType | AuthError::InvalidCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::ParseIamJwt(_)
            | AuthError::RoleRequired
            | AuthError::RoleMismatch
            | AuthError::ParsePrivileges(_) => StatusCode::FORBIDDEN,
            AuthError::TenantNotFound(_) | AuthError::OrganizationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AuthError::ApplyPrivileges(_) | AuthError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::IncorrectTokenType => "INCORRECT_TOKEN_TYPE",
            AuthError::ParseIamJwt(_) => "PARSE_IAM_JWT",
            AuthError::RoleRequired => "ROLE_REQUIRED",
            AuthError::RoleMismatch => "ROLE_MISMATCH",
            AuthError::ParsePrivileges(_) => "PARSE_PRIVILEGES",
            AuthError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            AuthError::OrganizationNotFound(_) => "ORGANIZATION_NOT_FOUND",
            AuthError::ApplyPrivileges(_) => "APPLY_PRIVILEGES",
            AuthError::InvalidCredentials(_) => "UNAUTHORIZED",
            AuthError::Store(_) => "INTERNAL_ERROR",
        }
    }
}
