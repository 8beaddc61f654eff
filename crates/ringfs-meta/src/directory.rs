//! Namespace operations for the metadata authority.
//!
//! Directory records are stored in the persistent tree under
//! `<volume>:<path>/`. Every directory key sorts directly after its parent
//! prefix, so a prefix scan over `<volume>:<path>/` yields the whole subtree
//! and all keys of one volume are contiguous.
//!
//! Writers build a transaction on the current snapshot and only repoint
//! [`Namespace`] at the committed result once every check has passed.

use crate::kvstore::Snapshot;
use crate::types::{DirRecord, InodeRef, MetaError, MetaPath, VolumeId, VOLUME_DELIMITER};
use crate::volume::VolumeRegistry;

/// The namespace tree together with the volume registry it must stay consistent with.
#[derive(Default)]
pub struct Namespace {
    tree: Snapshot<DirRecord>,
    volumes: VolumeRegistry,
}

impl Namespace {
    /// Creates an empty namespace with no volumes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current committed snapshot.
    pub fn snapshot(&self) -> Snapshot<DirRecord> {
        self.tree.clone()
    }

    /// The volume registry.
    pub fn volumes(&self) -> &VolumeRegistry {
        &self.volumes
    }

    /// Creates a volume and its root directory.
    ///
    /// Returns the new volume ID, or None when the root key was already present
    /// in the tree, in which case nothing is registered.
    pub fn create_volume(&mut self, name: &str) -> Result<Option<VolumeId>, MetaError> {
        validate_volume_name(name)?;
        if self.volumes.contains(name) {
            return Err(MetaError::exists(format!("volume '{}'", name)));
        }

        let key = MetaPath::root(name).key().into_bytes();
        let mut tx = self.tree.txn();
        if tx.contains_key(&key) {
            tracing::debug!(volume = %name, "volume root already present, skipping registration");
            return Ok(None);
        }
        tx.insert(key, DirRecord::Absent);
        let committed = tx.commit();

        let id = self.volumes.register(name)?;
        self.tree = committed;
        tracing::info!(volume = %name, id = %id, "created volume");
        Ok(Some(id))
    }

    /// Creates a directory node. Every ancestor, up to the volume root, must already exist.
    pub fn make_directory(&mut self, path: &MetaPath, record: DirRecord) -> Result<(), MetaError> {
        require_absolute(path)?;
        if path.is_root() {
            return Err(MetaError::InvalidArgument(format!(
                "cannot create the root directory of volume '{}'",
                path.volume
            )));
        }
        let path = path.as_dir();
        let key = path.key().into_bytes();

        let mut tx = self.tree.txn();
        if tx.contains_key(&key) {
            return Err(MetaError::exists(&path));
        }
        tx.insert(key, record);

        let mut ancestor = path.parent();
        while let Some(parent) = ancestor {
            if !tx.contains_key(parent.key().as_bytes()) {
                return Err(MetaError::not_found(format!("parent directory {}", parent)));
            }
            ancestor = parent.parent();
        }

        self.tree = tx.commit();
        tracing::debug!(path = %path, "created directory");
        Ok(())
    }

    /// Binds the filename at the end of `path` to an inode in its containing directory.
    pub fn bind_file_inode(&mut self, path: &MetaPath, inode: InodeRef) -> Result<(), MetaError> {
        require_absolute(path)?;
        let volume = self.volumes.resolve(&path.volume)?;
        if volume != inode.volume {
            return Err(MetaError::VolumeMismatch {
                expected: volume,
                actual: inode.volume,
            });
        }

        let (dir_path, filename) = path.split_file();
        if filename.is_empty() {
            return Err(MetaError::InvalidArgument(format!(
                "{} does not name a file",
                path
            )));
        }

        let key = dir_path.key().into_bytes();
        let mut tx = self.tree.txn();
        let record = tx
            .get(&key)
            .cloned()
            .ok_or_else(|| MetaError::not_found(&dir_path))?;

        let mut dir = record.into_directory();
        dir.files.insert(filename.to_string(), inode.inode);
        tx.insert(key, DirRecord::Present(dir));
        self.tree = tx.commit();

        tracing::debug!(path = %path, inode = %inode, "bound file inode");
        Ok(())
    }
}

/// Reads a directory record and every path below it from a snapshot.
pub fn get_directory(
    tree: &Snapshot<DirRecord>,
    path: &MetaPath,
) -> Result<(DirRecord, Vec<MetaPath>), MetaError> {
    require_absolute(path)?;
    let dir = path.as_dir();
    let prefix = dir.subdirs_prefix();
    let record = tree
        .get(prefix.as_bytes())
        .cloned()
        .ok_or_else(|| MetaError::not_found(&dir))?;

    let children = tree
        .scan_prefix(prefix.as_bytes())
        .into_iter()
        .filter_map(|(key, _)| {
            let suffix = key.get(prefix.len()..).filter(|s| !s.is_empty())?;
            Some(MetaPath::new(
                dir.volume.clone(),
                format!("{}{}", dir.path, String::from_utf8_lossy(suffix)),
            ))
        })
        .collect();

    Ok((record, children))
}

/// Lists volume names in key order by splitting each key at the first delimiter.
pub fn list_volumes(tree: &Snapshot<DirRecord>) -> Vec<String> {
    let delimiter = VOLUME_DELIMITER as u8;
    let mut out: Vec<String> = Vec::new();
    for (key, _) in tree.iter() {
        let Some(i) = key.iter().position(|&b| b == delimiter) else {
            continue;
        };
        let volume = String::from_utf8_lossy(&key[..i]);
        if out.last().map(String::as_str) == Some(&*volume) {
            continue;
        }
        out.push(volume.into_owned());
    }
    out
}

/// Relative paths would skip the parent walk and never reach the volume root.
fn require_absolute(path: &MetaPath) -> Result<(), MetaError> {
    if !path.is_absolute() {
        return Err(MetaError::InvalidArgument(format!(
            "{} is not an absolute path",
            path
        )));
    }
    Ok(())
}

fn validate_volume_name(name: &str) -> Result<(), MetaError> {
    if name.is_empty() {
        return Err(MetaError::InvalidArgument("volume name is empty".into()));
    }
    if name.contains(VOLUME_DELIMITER) {
        return Err(MetaError::InvalidArgument(format!(
            "volume name '{}' contains '{}'",
            name, VOLUME_DELIMITER
        )));
    }
    Ok(())
}
