//! Managed media files inside a project directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::paths::{StorageConfig, StoragePaths};

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Failed to read file: {0}")]
    FileReadFailed(PathBuf),
    #[error("Invalid file name: {0}")]
    InvalidFileName(PathBuf),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Record linking a display name to the on-disk location of a registered file.
///
/// `location` is the relative path of the copy inside the project directory
/// and uniquely identifies the registration; `name` is the original file name
/// kept for display. Configuration entries (e.g. a button referencing an
/// audio sample) embed these records, so they serialize with the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRegistration {
    pub name: String,
    pub location: String,
}

/// Copies external files into project directories under generated names.
pub struct FileRegistrar {
    paths: StoragePaths,
}

impl FileRegistrar {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            paths: StoragePaths::new(config),
        }
    }

    /// Copy `source` into the project directory as `<file_id>-<file name>`.
    ///
    /// `file_id` must be unique within the project; the registrar composes it
    /// into the location but does not check for collisions, so reusing an id
    /// overwrites the earlier copy.
    pub async fn register_file(
        &self,
        source: &Path,
        file_id: &str,
        project_id: &str,
    ) -> Result<FileRegistration, RegistrarError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| RegistrarError::InvalidFileName(source.to_path_buf()))?;

        let bytes = tokio::fs::read(source)
            .await
            .map_err(|_| RegistrarError::FileReadFailed(source.to_path_buf()))?;

        let location = format!("{}-{}", file_id, name);
        let dest = self.paths.project_dir(project_id).join(&location);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| RegistrarError::StorageUnavailable(e.to_string()))?;

        debug!(
            project = project_id,
            file = %location,
            bytes = bytes.len(),
            "File registered"
        );
        Ok(FileRegistration { name, location })
    }

    /// Best-effort removal of a registered file.
    ///
    /// Failures (including the file already being gone) are logged and
    /// reported only through the returned flag, which callers are free to
    /// ignore.
    pub async fn delete_file(&self, project_id: &str, location: &str) -> bool {
        let path = self.paths.project_dir(project_id).join(location);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(project = project_id, file = location, "File deleted");
                true
            }
            Err(e) => {
                warn!(
                    project = project_id,
                    file = location,
                    error = %e,
                    "Failed to delete registered file"
                );
                false
            }
        }
    }
}
