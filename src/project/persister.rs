//! ConfigPersister — background throttled persistence actor
//!
//! Receives configuration snapshots from the host's change stream and writes
//! the latest one to disk at most once per interval, so a burst of edits
//! costs a single write instead of one per keystroke.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::store::{ConfigSnapshot, ProjectStore};

/// Default quiet interval between configuration writes.
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(5000);

/// Handle for feeding configuration snapshots to the persister actor.
///
/// `notify` replaces the held snapshot and never blocks or fails the caller.
/// Dropping the handle closes the stream; the actor performs one final flush
/// of the latest snapshot and exits.
pub struct PersisterHandle {
    tx: watch::Sender<Option<ConfigSnapshot>>,
}

impl PersisterHandle {
    /// Record a new configuration snapshot as the latest state to persist.
    pub fn notify(&self, snapshot: ConfigSnapshot) {
        // The receiver lives inside the actor; send only fails after shutdown.
        let _ = self.tx.send(Some(snapshot));
    }
}

/// Spawn the persister actor for one project, returning its handle.
///
/// Throttle policy: the first notification after a write (or after idle) arms
/// the timer; notifications inside the window only replace the held snapshot
/// and do not reset it. When the timer fires, the **latest** snapshot at that
/// moment is written with `excluded_keys` stripped from its top level, so at
/// most one write happens per `interval`. All writes for the project go
/// through this single loop, which is the serialization point for the
/// configuration file.
///
/// A failed write is logged and does not stop the actor.
pub fn spawn_config_persister(
    store: Arc<ProjectStore>,
    project_id: impl Into<String>,
    excluded_keys: Vec<String>,
    interval: Duration,
) -> PersisterHandle {
    let project_id = project_id.into();
    let (tx, mut rx) = watch::channel(None::<ConfigSnapshot>);

    tokio::spawn(async move {
        loop {
            // Wait for the first change since the previous write.
            if rx.changed().await.is_err() {
                // Handle dropped: flush whatever arrived last, then exit.
                flush_latest(&store, &project_id, &excluded_keys, &mut rx).await;
                info!(project = %project_id, "Persister stopped, final flush done");
                return;
            }

            // Throttle window. Snapshots arriving while we sleep land in the
            // watch channel and are picked up below.
            tokio::time::sleep(interval).await;

            flush_latest(&store, &project_id, &excluded_keys, &mut rx).await;
        }
    });

    PersisterHandle { tx }
}

/// Take the latest snapshot and write it via `spawn_blocking`.
async fn flush_latest(
    store: &Arc<ProjectStore>,
    project_id: &str,
    excluded_keys: &[String],
    rx: &mut watch::Receiver<Option<ConfigSnapshot>>,
) {
    let Some(snapshot) = rx.borrow_and_update().as_ref().cloned() else {
        return;
    };
    let filtered = strip_excluded(snapshot, excluded_keys);

    let store = Arc::clone(store);
    let id = project_id.to_string();
    let result = tokio::task::spawn_blocking(move || store.save_config(&id, &filtered)).await;

    match result {
        Ok(Ok(())) => {
            debug!(project = project_id, "Config persisted (throttled)");
        }
        Ok(Err(e)) => {
            error!(project = project_id, error = %e, "Failed to persist config");
        }
        Err(e) => {
            error!(project = project_id, error = %e, "Persist task panicked");
        }
    }
}

/// Remove excluded top-level keys (runtime-only subsystems) from a snapshot.
pub fn strip_excluded(mut snapshot: ConfigSnapshot, excluded_keys: &[String]) -> ConfigSnapshot {
    for key in excluded_keys {
        snapshot.remove(key);
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::paths::StorageConfig;
    use crate::project::store::StoreError;
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot_with_volume(volume: f64) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::new();
        snapshot.insert("volume".to_string(), json!(volume));
        snapshot.insert("scheduler".to_string(), json!({"running": true}));
        snapshot
    }

    #[test]
    fn test_strip_excluded_keys() {
        let excluded = vec!["scheduler".to_string(), "fileLoader".to_string()];
        let mut snapshot = snapshot_with_volume(0.5);
        snapshot.insert("fileLoader".to_string(), json!({"pending": 3}));

        let filtered = strip_excluded(snapshot, &excluded);
        assert_eq!(filtered.get("volume"), Some(&json!(0.5)));
        assert!(!filtered.contains_key("scheduler"));
        assert!(!filtered.contains_key("fileLoader"));
    }

    #[tokio::test]
    async fn test_burst_collapses_to_one_write_with_latest_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ProjectStore::new(&StorageConfig::new(temp.path())));
        store.initialize().unwrap();

        let handle = spawn_config_persister(
            Arc::clone(&store),
            "demo",
            vec!["scheduler".to_string()],
            Duration::from_millis(150),
        );

        for volume in 1..=5 {
            handle.notify(snapshot_with_volume(volume as f64));
        }

        // Nothing may hit the disk before the interval elapses.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(
            store.read_config("demo"),
            Err(StoreError::ProjectNotFound(_))
        ));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let config = store.read_config("demo").unwrap();
        assert_eq!(config.get("volume"), Some(&json!(5.0)));
        assert!(!config.contains_key("scheduler"));
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_the_actor() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ProjectStore::new(&StorageConfig::new(temp.path())));
        store.initialize().unwrap();

        // A plain file where the project directory should go makes the write fail.
        std::fs::write(store.paths().project_dir("jammed"), b"in the way").unwrap();

        let handle = spawn_config_persister(
            Arc::clone(&store),
            "jammed",
            Vec::new(),
            Duration::from_millis(50),
        );

        handle.notify(snapshot_with_volume(0.2));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.read_config("jammed").is_err());

        // Clear the obstruction; the actor must still be scheduling writes.
        std::fs::remove_file(store.paths().project_dir("jammed")).unwrap();
        handle.notify(snapshot_with_volume(0.7));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let config = store.read_config("jammed").unwrap();
        assert_eq!(config.get("volume"), Some(&json!(0.7)));
    }
}
