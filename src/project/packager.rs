//! Archive export/import of whole project directories

use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;

use super::paths::{StorageConfig, StoragePaths};

/// File extension of exported project archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("Failed to read file: {0}")]
    FileReadFailed(PathBuf),
    #[error("Import of '{id}' incomplete: {} entries failed", .failed.len())]
    PartialImport { id: String, failed: Vec<String> },
}

/// In-memory archive entry: relative name and exact bytes.
type ArchiveEntry = (String, Vec<u8>);

/// Exports a project directory into a single portable ZIP archive and imports
/// such an archive into a new, collision-free project directory.
pub struct Packager {
    paths: StoragePaths,
}

impl Packager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            paths: StoragePaths::new(config),
        }
    }

    /// Export a project into `<id>.zip` inside `dest_dir`.
    ///
    /// All top-level files of the project directory are read concurrently;
    /// a single failed read aborts the whole export and no archive is
    /// delivered. Returns the path of the written archive.
    pub async fn export_project(
        &self,
        project_id: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, PackageError> {
        let entries = self.read_project_entries(project_id).await?;
        let archive_path = dest_dir.join(format!("{}.{}", project_id, ARCHIVE_EXTENSION));

        let path = archive_path.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::create(&path)
                .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;
            write_zip(file, &entries)?;
            Ok::<(), PackageError>(())
        })
        .await
        .map_err(|e| PackageError::StorageUnavailable(e.to_string()))??;

        info!(
            project = project_id,
            archive = %archive_path.display(),
            "Project exported"
        );
        Ok(archive_path)
    }

    /// Serialize a project archive into a caller-supplied sink.
    ///
    /// Same read semantics as `export_project`; the sink is returned after
    /// the archive's central directory has been written.
    pub async fn write_archive<W>(&self, project_id: &str, writer: W) -> Result<W, PackageError>
    where
        W: Write + Seek + Send + 'static,
    {
        let entries = self.read_project_entries(project_id).await?;
        tokio::task::spawn_blocking(move || write_zip(writer, &entries))
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?
    }

    /// Import a project archive, creating a new project directory.
    ///
    /// The candidate id is the archive's file stem; if a project with that id
    /// already exists, `-1`, `-2`, ... is appended until a free directory
    /// name is found, so an import never overwrites an existing project.
    /// Entries are extracted concurrently and the call returns only after
    /// every write has completed. A failed entry does not roll back the rest:
    /// the partially populated directory stays on disk and the failure is
    /// surfaced as `PartialImport`.
    pub async fn import_project(&self, archive_path: &Path) -> Result<String, PackageError> {
        let candidate = archive_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PackageError::CorruptArchive(format!(
                    "invalid archive name: {}",
                    archive_path.display()
                ))
            })?;

        let project_id = self.resolve_free_id(candidate);
        let project_dir = self.paths.project_dir(&project_id);

        tokio::fs::create_dir_all(self.paths.projects_dir())
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;
        // create_dir (not _all): refuses to reuse a directory that appeared
        // between the free-id probe and now.
        tokio::fs::create_dir(&project_dir)
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;

        let bytes = tokio::fs::read(archive_path)
            .await
            .map_err(|_| PackageError::FileReadFailed(archive_path.to_path_buf()))?;

        let entries = tokio::task::spawn_blocking(move || read_zip(&bytes))
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))??;

        // Launch every entry write, then join on all completions.
        let writes = entries.into_iter().map(|(name, bytes)| {
            let dest = project_dir.join(&name);
            async move {
                if let Some(parent) = dest.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return Err((name, e));
                    }
                }
                match tokio::fs::write(&dest, &bytes).await {
                    Ok(()) => Ok(()),
                    Err(e) => Err((name, e)),
                }
            }
        });

        let mut failed = Vec::new();
        for result in futures::future::join_all(writes).await {
            if let Err((name, e)) = result {
                warn!(
                    project = %project_id,
                    entry = %name,
                    error = %e,
                    "Failed to extract archive entry"
                );
                failed.push(name);
            }
        }

        if !failed.is_empty() {
            return Err(PackageError::PartialImport {
                id: project_id,
                failed,
            });
        }

        info!(project = %project_id, archive = %archive_path.display(), "Project imported");
        Ok(project_id)
    }

    /// Enumerate the project directory and read every top-level file
    /// concurrently. Waits for all reads; the first failure aborts.
    async fn read_project_entries(
        &self,
        project_id: &str,
    ) -> Result<Vec<ArchiveEntry>, PackageError> {
        let project_dir = self.paths.project_dir(project_id);
        if !project_dir.is_dir() {
            return Err(PackageError::ProjectNotFound(project_id.to_string()));
        }

        let mut dir = tokio::fs::read_dir(&project_dir)
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;

        let mut reads = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;

            // Only top-level files are packaged.
            if file_type.is_dir() {
                warn!(project = project_id, entry = %name, "Skipping subdirectory during export");
                continue;
            }

            reads.push(async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok((name, bytes)),
                    Err(_) => Err(PackageError::FileReadFailed(path)),
                }
            });
        }

        let mut entries = Vec::with_capacity(reads.len());
        for result in futures::future::join_all(reads).await {
            entries.push(result?);
        }
        Ok(entries)
    }

    /// Find a non-existing project id by appending `-1`, `-2`, ...
    /// Terminates after at most existing-directory-count + 1 probes.
    fn resolve_free_id(&self, candidate: &str) -> String {
        if !self.paths.project_dir(candidate).exists() {
            return candidate.to_string();
        }

        let mut counter = 1;
        loop {
            let id = format!("{}-{}", candidate, counter);
            if !self.paths.project_dir(&id).exists() {
                return id;
            }
            counter += 1;
        }
    }
}

fn write_zip<W: Write + Seek>(writer: W, entries: &[ArchiveEntry]) -> Result<W, PackageError> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;
        zip.write_all(bytes)
            .map_err(|e| PackageError::StorageUnavailable(e.to_string()))?;
    }

    zip.finish()
        .map_err(|e| PackageError::StorageUnavailable(e.to_string()))
}

fn read_zip(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, PackageError> {
    let cursor = Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| PackageError::CorruptArchive(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| PackageError::CorruptArchive(e.to_string()))?;

        if file.is_dir() {
            continue;
        }
        if file.enclosed_name().is_none() {
            return Err(PackageError::CorruptArchive(format!(
                "unsafe entry path: {}",
                file.name()
            )));
        }

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| PackageError::CorruptArchive(e.to_string()))?;
        entries.push((file.name().to_string(), content));
    }

    Ok(entries)
}
