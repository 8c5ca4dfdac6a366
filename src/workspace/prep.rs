//! Workspace preparation: each job writes into its own subdirectory of the
//! configured workspace root, wiped and recreated at the start of every run.

use crate::error::ApiError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory a job writes into: `<root>/<job_id>`.
pub fn job_workspace(root: &Path, job_id: &str) -> PathBuf {
    root.join(job_id)
}

/// Recursively remove then recreate `dir`. Idempotent; a missing directory is
/// not an error.
pub async fn prepare_workspace(dir: &Path) -> Result<(), ApiError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ApiError::WorkspaceError(format!(
                "Failed to clear {}: {}",
                dir.display(),
                e
            )))
        }
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        ApiError::WorkspaceError(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    debug!(workspace = %dir.display(), "Workspace cleaned");
    Ok(())
}
