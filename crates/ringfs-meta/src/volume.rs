//! Volume registry: name to numeric ID, backed by a monotonic counter.
//!
//! IDs are never reused. The registry only ever grows through
//! [`crate::directory::Namespace::create_volume`], which keeps it in step with
//! the volume root keys in the namespace tree.

use std::collections::HashMap;

use crate::types::{MetaError, VolumeId};

/// Name to ID index for volumes.
#[derive(Debug, Default)]
pub struct VolumeRegistry {
    last_id: u64,
    by_name: HashMap<String, VolumeId>,
}

impl VolumeRegistry {
    /// Creates an empty registry. The first registered volume gets ID 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Assigns the next ID to `name`.
    pub(crate) fn register(&mut self, name: &str) -> Result<VolumeId, MetaError> {
        if self.by_name.contains_key(name) {
            return Err(MetaError::exists(name));
        }
        self.last_id += 1;
        let id = VolumeId::new(self.last_id);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Looks up the ID of a volume.
    pub fn resolve(&self, name: &str) -> Result<VolumeId, MetaError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| MetaError::not_found(format!("volume '{}'", name)))
    }

    /// Number of registered volumes.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if no volume has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
