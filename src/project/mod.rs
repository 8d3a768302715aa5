//! Project storage core - directory lifecycle, persistence, packaging
//!
//! This module provides:
//! - Storage root bootstrap and project id -> path mapping
//! - Atomic configuration document reads/writes
//! - Throttled background persistence of configuration snapshots
//! - ZIP export/import of whole project directories
//! - Managed media file registration

pub mod packager;
pub mod paths;
pub mod persister;
pub mod registrar;
pub mod store;

pub use packager::{PackageError, Packager, ARCHIVE_EXTENSION};
pub use paths::{StorageConfig, StoragePaths, CONFIG_FILE_NAME};
pub use persister::{
    spawn_config_persister, PersisterHandle, DEFAULT_WRITE_INTERVAL,
};
pub use registrar::{FileRegistrar, FileRegistration, RegistrarError};
pub use store::{ConfigSnapshot, ProjectStore, StoreError};
