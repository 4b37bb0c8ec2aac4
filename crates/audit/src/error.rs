use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("open audit file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("marshal audit record: {0}")]
    Marshal(String),

    #[error("audit sink already installed")]
    AlreadyInstalled,
}
