//! Uploaded document storage: `<uuid>.<ext>` files in one directory.
//!
//! Documents are read back as UTF-8 text (lossy); no PDF extraction.

use compliance_core::error::{OrchestratorError, Result};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "txt";

/// Extension of an uploaded file name, if it is short and alphanumeric.
pub fn extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.into())
}

/// Reject ids that could escape the upload directory.
pub fn validate_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) || id.contains("..") {
        return Err(OrchestratorError::invalid_input(format!("invalid document id '{id}'")));
    }
    Ok(id)
}

/// Store `bytes` and return the new document id.
pub async fn store(dir: &Path, filename: Option<&str>, bytes: &[u8]) -> Result<String> {
    let id = format!("{}.{}", Uuid::new_v4(), extension(filename));
    tokio::fs::write(dir.join(&id), bytes).await?;
    debug!("Stored {} byte(s) as {id}", bytes.len());
    Ok(id)
}

/// Read a stored document as text.
pub async fn load(dir: &Path, id: &str) -> Result<String> {
    let id = validate_id(id)?;
    match tokio::fs::read(dir.join(id)).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OrchestratorError::not_found(format!("document '{id}'")))
        }
        Err(e) => Err(e.into()),
    }
}
