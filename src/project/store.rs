//! Configuration document persistence for projects

use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info};

use super::paths::{StorageConfig, StoragePaths};

/// Top-level configuration document of a project.
///
/// The document is an arbitrary nested JSON object; this crate never
/// interprets its contents beyond requiring an object at the top level.
pub type ConfigSnapshot = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Corrupt config: {0}")]
    CorruptConfig(String),
}

/// Owns the storage root and the `projects/` directory beneath it.
pub struct ProjectStore {
    paths: StoragePaths,
}

impl ProjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            paths: StoragePaths::new(config),
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the root and projects directories.
    ///
    /// Pre-existing directories are success; any other filesystem failure
    /// surfaces as `StorageUnavailable`.
    pub fn initialize(&self) -> Result<(), StoreError> {
        if self.paths.projects_dir().is_dir() {
            info!(root = %self.paths.root().display(), "Storage directories already exist");
            return Ok(());
        }

        fs::create_dir_all(self.paths.projects_dir())
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        info!(root = %self.paths.root().display(), "Created storage directories");
        Ok(())
    }

    /// Read and parse a project's configuration document.
    pub fn read_config(&self, project_id: &str) -> Result<ConfigSnapshot, StoreError> {
        let path = self.paths.config_path(project_id);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ProjectNotFound(project_id.to_string()));
            }
            Err(e) => return Err(StoreError::StorageUnavailable(e.to_string())),
        };

        let value: Value =
            serde_json::from_str(&content).map_err(|e| StoreError::CorruptConfig(e.to_string()))?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::CorruptConfig(
                "top-level value is not an object".to_string(),
            )),
        }
    }

    /// Write a project's configuration document.
    ///
    /// The document is pretty-printed to a temp file in the project directory
    /// and renamed over `project.json`, so a concurrent reader never observes
    /// a partial write. Creates the project directory on first save and
    /// overwrites any existing document. Concurrent callers for the same id
    /// are not synchronized; their relative order is undefined.
    pub fn save_config(
        &self,
        project_id: &str,
        snapshot: &ConfigSnapshot,
    ) -> Result<(), StoreError> {
        let path = self.paths.config_path(project_id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        // Write to temp file first (atomic write)
        let temp_path = path.with_extension("json.tmp");
        {
            let mut temp_file = fs::File::create(&temp_path)
                .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            temp_file
                .write_all(content.as_bytes())
                .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            temp_file
                .sync_all()
                .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        }

        fs::rename(&temp_path, &path).map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        debug!(project = project_id, bytes = content.len(), "Config saved");
        Ok(())
    }

    /// List the ids of all projects on disk, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();

        if !self.paths.projects_dir().exists() {
            return Ok(ids);
        }

        let entries = fs::read_dir(self.paths.projects_dir())
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            if entry.path().is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    pub fn project_exists(&self, project_id: &str) -> bool {
        self.paths.project_dir(project_id).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ProjectStore {
        ProjectStore::new(&StorageConfig::new(temp.path()))
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.initialize().unwrap();
        assert!(store.paths().projects_dir().is_dir());

        // Second run finds the directories and succeeds without touching them.
        store.initialize().unwrap();
        assert!(store.paths().projects_dir().is_dir());
    }

    #[test]
    fn test_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.initialize().unwrap();

        let mut snapshot = ConfigSnapshot::new();
        snapshot.insert("volume".to_string(), json!(0.5));
        snapshot.insert(
            "buttons".to_string(),
            json!([{"id": "b1", "type": "audioSample", "gain": 0.8}]),
        );

        store.save_config("demo", &snapshot).unwrap();
        let read_back = store.read_config("demo").unwrap();
        assert_eq!(read_back, snapshot);
    }

    #[test]
    fn test_save_overwrites_previous_config() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.initialize().unwrap();

        let mut first = ConfigSnapshot::new();
        first.insert("volume".to_string(), json!(0.1));
        store.save_config("demo", &first).unwrap();

        let mut second = ConfigSnapshot::new();
        second.insert("volume".to_string(), json!(0.9));
        store.save_config("demo", &second).unwrap();

        assert_eq!(store.read_config("demo").unwrap(), second);
    }

    #[test]
    fn test_missing_project_is_not_a_generic_io_error() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.initialize().unwrap();

        assert!(matches!(
            store.read_config("nope"),
            Err(StoreError::ProjectNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_unparseable_config_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.initialize().unwrap();

        let dir = store.paths().project_dir("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(store.paths().config_path("broken"), "{not json").unwrap();

        assert!(matches!(
            store.read_config("broken"),
            Err(StoreError::CorruptConfig(_))
        ));

        // Valid JSON that is not an object is corrupt too.
        fs::write(store.paths().config_path("broken"), "42").unwrap();
        assert!(matches!(
            store.read_config("broken"),
            Err(StoreError::CorruptConfig(_))
        ));
    }

    #[test]
    fn test_list_projects() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.initialize().unwrap();

        assert!(store.list_projects().unwrap().is_empty());

        store.save_config("beta", &ConfigSnapshot::new()).unwrap();
        store.save_config("alpha", &ConfigSnapshot::new()).unwrap();

        assert_eq!(store.list_projects().unwrap(), vec!["alpha", "beta"]);
        assert!(store.project_exists("alpha"));
        assert!(!store.project_exists("gamma"));
    }
}
