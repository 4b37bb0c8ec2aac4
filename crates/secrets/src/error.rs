use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret storage unavailable after {attempts} attempts: {reason}")]
    SecretStorageUnavailable { attempts: u32, reason: String },

    #[error("can not get wrapped secret: unwrap returned empty role_id or secret_id")]
    CannotGetWrappedSecret,

    #[error("secret storage login returned an empty client token")]
    EmptyClientToken,

    #[error("secret storage wrap returned an empty wrapped token")]
    EmptyWrappedToken,

    #[error("secret storage responded {status} to {operation}: {body}")]
    Upstream {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("decode {operation} response: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("wrap token file {path}: {reason}")]
    WrapFile { path: PathBuf, reason: String },

    #[error("secret {secret} has no value for key {key}")]
    EmptySecret { secret: String, key: String },

    #[error("build secret storage client: {0}")]
    Client(String),

    #[error("secret broker is not enabled")]
    Disabled,
}
