//! On-disk wrapped secret id: `{"wrapped_secret_id": "..."}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SecretError;

#[derive(Debug, Serialize, Deserialize)]
struct WrapFile {
    wrapped_secret_id: String,
}

fn file_error(path: &Path, reason: impl ToString) -> SecretError {
    SecretError::WrapFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Read the current wrapped secret id.
pub async fn read_wrapped_id(path: &Path) -> Result<String, SecretError> {
    let raw = tokio::fs::read(path).await.map_err(|e| file_error(path, e))?;
    let file: WrapFile = serde_json::from_slice(&raw).map_err(|e| file_error(path, e))?;
    if file.wrapped_secret_id.is_empty() {
        return Err(file_error(path, "wrapped_secret_id is empty"));
    }
    Ok(file.wrapped_secret_id)
}

/// Replace the file contents with `wrapped_id`.
///
/// The document goes to a sibling `.tmp` file first, which is then renamed
/// over `path`. Mode is 0666.
pub async fn write_wrapped_id(path: &Path, wrapped_id: &str) -> Result<(), SecretError> {
    let body = serde_json::to_vec(&WrapFile {
        wrapped_secret_id: wrapped_id.to_string(),
    })
    .map_err(|e| file_error(path, e))?;

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &body).await.map_err(|e| file_error(&tmp, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o666))
            .await
            .map_err(|e| file_error(&tmp, e))?;
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(file_error(path, e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "wrap".into());
    name.push(".tmp");
    path.with_file_name(name)
}
