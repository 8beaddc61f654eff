//! Common test utilities and fixtures for integration tests.

use std::sync::Arc;

use ringfs_meta::{Authority, DirRecord, Directory, LocalMetadata, MetaConfig};

/// A fresh authority with one client handle on it.
pub fn new_service() -> LocalMetadata {
    let config = MetaConfig::default();
    let authority = Arc::new(Authority::new(&config).expect("default config is valid"));
    LocalMetadata::new(&config, authority)
}

/// A directory record with the usual mode.
pub fn dir() -> DirRecord {
    DirRecord::Present(Directory::new(0o755))
}
