//! showdeck-core - project storage and packaging for the ShowDeck controller
//!
//! Persists named projects (a JSON configuration document plus media files)
//! under a host-supplied storage root, keeps the configuration flowing to
//! disk in the background, and packages whole projects into portable ZIP
//! archives for transfer between machines.

pub mod project;
pub mod util;

pub use project::{
    spawn_config_persister, ConfigSnapshot, FileRegistrar, FileRegistration, PackageError,
    Packager, PersisterHandle, ProjectStore, RegistrarError, StorageConfig, StoragePaths,
    StoreError, ARCHIVE_EXTENSION, CONFIG_FILE_NAME, DEFAULT_WRITE_INTERVAL,
};
