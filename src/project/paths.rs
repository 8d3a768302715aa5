//! Storage layout configuration and path resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the configuration document inside a project directory.
pub const CONFIG_FILE_NAME: &str = "project.json";

const PROJECTS_DIR_NAME: &str = "projects";

/// Host-supplied storage configuration.
///
/// The host application decides where project data lives (typically its
/// user-data directory) and passes this struct into every component
/// constructor. Everything below `root` is owned by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all persisted data.
    pub root: PathBuf,
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Pure project id -> path mapping under a storage root. No I/O.
///
/// The id is used verbatim as the directory name, so the mapping is
/// deterministic and injective. Ids must be non-empty, path-segment-safe
/// strings; validating them is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    projects_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(config: &StorageConfig) -> Self {
        let root = config.root.clone();
        let projects_dir = root.join(PROJECTS_DIR_NAME);
        Self { root, projects_dir }
    }

    /// The storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all project directories.
    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Directory of a single project.
    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.projects_dir.join(project_id)
    }

    /// Path of a project's configuration document.
    pub fn config_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_layout() {
        let config = StorageConfig::new("/data/showdeck");
        let paths = StoragePaths::new(&config);

        assert_eq!(paths.root(), Path::new("/data/showdeck"));
        assert_eq!(paths.projects_dir(), Path::new("/data/showdeck/projects"));
        assert_eq!(
            paths.project_dir("demo"),
            PathBuf::from("/data/showdeck/projects/demo")
        );
        assert_eq!(
            paths.config_path("demo"),
            PathBuf::from("/data/showdeck/projects/demo/project.json")
        );
    }

    #[test]
    fn test_distinct_ids_map_to_distinct_dirs() {
        let paths = StoragePaths::new(&StorageConfig::new("/tmp/root"));
        assert_ne!(paths.project_dir("show"), paths.project_dir("show-1"));
    }
}
