use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::blockspec::BlockLayerSpec;

/// Separator between the volume name and the path in a namespace key.
pub const VOLUME_DELIMITER: char = ':';

/// Represents a unique identifier for an inode, allocated by the metadata authority
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InodeId(u64);

impl InodeId {
    /// Creates a new InodeId from a raw u64 value
    pub fn new(id: u64) -> Self {
        InodeId(id)
    }

    /// Returns the raw u64 value of this inode ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the numeric identifier assigned to a volume at creation time
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(u64);

impl VolumeId {
    /// Creates a new VolumeId from a raw u64 value
    pub fn new(id: u64) -> Self {
        VolumeId(id)
    }

    /// Returns the raw u64 value of this volume ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inode qualified by the volume it belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InodeRef {
    /// Owning volume
    pub volume: VolumeId,
    /// Inode within the volume
    pub inode: InodeId,
}

impl InodeRef {
    /// Creates a new inode reference
    pub fn new(volume: VolumeId, inode: InodeId) -> Self {
        Self { volume, inode }
    }
}

impl fmt::Display for InodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vol({}):inode({})", self.volume, self.inode)
    }
}

/// A single block of an inode, the unit that rings place on peers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// The inode owning the block
    pub inode: InodeRef,
    /// Block index within the inode
    pub index: u64,
}

impl BlockRef {
    /// Creates a new block reference
    pub fn new(inode: InodeRef, index: u64) -> Self {
        Self { inode, index }
    }

    /// Fixed-width byte encoding used for placement hashing.
    pub fn to_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[..8].copy_from_slice(&self.inode.volume.as_u64().to_be_bytes());
        out[8..16].copy_from_slice(&self.inode.inode.as_u64().to_be_bytes());
        out[16..].copy_from_slice(&self.index.to_be_bytes());
        out
    }
}

/// A (volume, path) pair addressing a node in the namespace tree.
///
/// Directory paths carry a trailing `/`; the volume root is `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetaPath {
    /// Volume name
    pub volume: String,
    /// Slash-separated path within the volume
    pub path: String,
}

impl MetaPath {
    /// Creates a new path
    pub fn new(volume: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            path: path.into(),
        }
    }

    /// The root path of a volume.
    pub fn root(volume: impl Into<String>) -> Self {
        Self::new(volume, "/")
    }

    /// Canonical namespace key, `<volume>:<path>`.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.volume, VOLUME_DELIMITER, self.path)
    }

    /// Returns true if this path ends with `/`.
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Returns true if the path starts at the volume root.
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Returns true if this path denotes the volume root.
    pub fn is_root(&self) -> bool {
        self.path.is_empty() || self.path == "/"
    }

    /// Returns the same path with a guaranteed trailing `/`.
    pub fn as_dir(&self) -> MetaPath {
        if self.is_dir() {
            self.clone()
        } else {
            MetaPath::new(self.volume.clone(), format!("{}/", self.path))
        }
    }

    /// Prefix under which every descendant of this directory is keyed.
    pub fn subdirs_prefix(&self) -> String {
        self.as_dir().key()
    }

    /// Parent directory of this path, or None once the walk runs out of segments.
    ///
    /// `/a/b/` and `/a/b` both yield `/a/`; `/` yields None.
    pub fn parent(&self) -> Option<MetaPath> {
        let trimmed = self.path.strip_suffix('/').unwrap_or(&self.path);
        let (dir, _) = split_at_last_slash(trimmed);
        if dir.is_empty() {
            return None;
        }
        Some(MetaPath::new(self.volume.clone(), dir))
    }

    /// Splits a file path into its containing directory and filename.
    pub fn split_file(&self) -> (MetaPath, &str) {
        let (dir, file) = split_at_last_slash(&self.path);
        (MetaPath::new(self.volume.clone(), dir), file)
    }

}

impl fmt::Display for MetaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.volume, VOLUME_DELIMITER, self.path)
    }
}

/// Splits after the last `/`, keeping the slash on the directory part.
fn split_at_last_slash(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

/// Represents a point in time with second and nanosecond precision
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since Unix epoch
    pub secs: u64,
    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    /// Returns the current timestamp
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: now.as_secs(),
            nanos: now.subsec_nanos(),
        }
    }
}

/// Contents of a directory: a filename to inode mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Permission bits
    pub mode: u32,
    /// Files bound in this directory
    pub files: BTreeMap<String, InodeId>,
}

impl Directory {
    /// Creates an empty directory with the given mode
    pub fn new(mode: u32) -> Self {
        Self {
            mode,
            files: BTreeMap::new(),
        }
    }
}

/// The value stored under a namespace key.
///
/// `Absent` marks a directory node that exists but has never held a record,
/// such as a freshly created volume root. It is distinct from an empty `Directory`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirRecord {
    /// Existing node without a record
    Absent,
    /// Existing node with a directory record
    Present(Directory),
}

impl DirRecord {
    /// Returns the directory if one is stored.
    pub fn directory(&self) -> Option<&Directory> {
        match self {
            DirRecord::Absent => None,
            DirRecord::Present(dir) => Some(dir),
        }
    }

    /// Consumes the record, materialising an empty directory for `Absent`.
    pub fn into_directory(self) -> Directory {
        match self {
            DirRecord::Absent => Directory::default(),
            DirRecord::Present(dir) => dir,
        }
    }
}

/// Information about a storage peer known to the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Unique identity of the peer
    pub uuid: uuid::Uuid,
    /// Network address of the peer
    pub address: String,
    /// Last time the peer reported in
    pub last_seen: Timestamp,
    /// Total blocks the peer can hold
    pub total_blocks: u64,
    /// Blocks currently in use
    pub used_blocks: u64,
}

impl PeerInfo {
    /// Creates a new peer descriptor seen now, with no capacity reported yet
    pub fn new(uuid: uuid::Uuid, address: impl Into<String>) -> Self {
        Self {
            uuid,
            address: address.into(),
            last_seen: Timestamp::now(),
            total_blocks: 0,
            used_blocks: 0,
        }
    }
}

/// Cluster-wide constants fixed when the authority is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalMetadata {
    /// Block size in bytes
    pub block_size: u64,
    /// Block layer spec used when a file does not request one
    pub default_block_spec: BlockLayerSpec,
}

/// Error types for operations on the metadata authority
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// The key or name is already present.
    #[error("{key} already exists")]
    AlreadyExists {
        /// The conflicting key or name
        key: String,
    },

    /// The requested key, volume, or parent directory does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// The request is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The inode reference belongs to a different volume than the path.
    #[error("inode volume {actual} does not match path volume {expected}")]
    VolumeMismatch {
        /// Volume resolved from the path
        expected: VolumeId,
        /// Volume carried by the inode reference
        actual: VolumeId,
    },

    /// No metadata backend is registered under the given name.
    #[error("metadata backend '{0}' is not registered")]
    Unregistered(String),

    /// The authority lock was poisoned by a panicking holder.
    #[error("authority lock poisoned: {0}")]
    LockPoisoned(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl MetaError {
    pub(crate) fn not_found(what: impl fmt::Display) -> Self {
        MetaError::NotFound {
            what: what.to_string(),
        }
    }

    pub(crate) fn exists(key: impl fmt::Display) -> Self {
        MetaError::AlreadyExists {
            key: key.to_string(),
        }
    }
}
