//! Named metadata backends.
//!
//! Callers pick a backend by name from configuration. The registry is an
//! ordinary value owned by whoever wires the node together.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{MetaConfig, TEMP_BACKEND};
use crate::service::{Authority, LocalMetadata, MetadataService};
use crate::types::MetaError;

/// Constructor for a metadata backend.
pub type BackendConstructor = fn(&MetaConfig) -> Result<Box<dyn MetadataService>, MetaError>;

/// Maps backend names to their constructors.
#[derive(Default)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TEMP_BACKEND, new_temp);
        registry
    }

    /// Registers a constructor, replacing any existing one with the same name.
    pub fn register(&mut self, name: &str, ctor: BackendConstructor) {
        if self.constructors.insert(name.to_string(), ctor).is_some() {
            tracing::debug!(backend = %name, "replaced metadata backend");
        }
    }

    /// Names of all registered backends, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Constructs the backend registered under `name`.
    pub fn create(
        &self,
        name: &str,
        config: &MetaConfig,
    ) -> Result<Box<dyn MetadataService>, MetaError> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| MetaError::Unregistered(name.to_string()))?;
        ctor(config)
    }

    /// Constructs the backend named in `config`.
    pub fn create_from_config(
        &self,
        config: &MetaConfig,
    ) -> Result<Box<dyn MetadataService>, MetaError> {
        self.create(&config.backend, config)
    }
}

/// The in-memory backend: a fresh authority with one client handle on it.
fn new_temp(config: &MetaConfig) -> Result<Box<dyn MetadataService>, MetaError> {
    let authority = Arc::new(Authority::new(config)?);
    Ok(Box::new(LocalMetadata::new(config, authority)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["temp"]);
        let svc = registry.create_from_config(&MetaConfig::default()).unwrap();
        svc.create_volume("v").unwrap();
        assert_eq!(svc.list_volumes().unwrap(), vec!["v"]);
    }

    #[test]
    fn test_unregistered_backend() {
        let registry = BackendRegistry::with_defaults();
        match registry.create("etcd", &MetaConfig::default()) {
            Err(MetaError::Unregistered(name)) => assert_eq!(name, "etcd"),
            Err(other) => panic!("expected Unregistered, got {:?}", other),
            Ok(_) => panic!("expected Unregistered, got a service"),
        }
    }

    #[test]
    fn test_register_replaces() {
        fn failing(_: &MetaConfig) -> Result<Box<dyn MetadataService>, MetaError> {
            Err(MetaError::InvalidArgument("disabled".into()))
        }
        let mut registry = BackendRegistry::with_defaults();
        registry.register(TEMP_BACKEND, failing);
        assert!(matches!(
            registry.create(TEMP_BACKEND, &MetaConfig::default()),
            Err(MetaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_each_temp_backend_is_independent() {
        let registry = BackendRegistry::with_defaults();
        let a = registry.create(TEMP_BACKEND, &MetaConfig::default()).unwrap();
        let b = registry.create(TEMP_BACKEND, &MetaConfig::default()).unwrap();
        a.create_volume("only-a").unwrap();
        assert!(b.list_volumes().unwrap().is_empty());
    }
}
