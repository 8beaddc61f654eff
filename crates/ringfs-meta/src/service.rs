//! The metadata authority and the service interface built on it.
//!
//! [`Authority`] owns every piece of metadata state behind one mutex: the
//! namespace tree and volume registry, the inode counter, the peer list, the
//! current ring descriptor, and the ring subscribers. Each mutating
//! operation holds the lock for exactly one atomic change. Namespace reads
//! only take the lock long enough to clone the current snapshot and then
//! scan it unlocked.
//!
//! [`LocalMetadata`] is the client handle handed to the rest of the node. Several
//! handles may share one authority, each with its own identity.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::blockspec::BlockLayerSpec;
use crate::config::MetaConfig;
use crate::directory::{self, Namespace};
use crate::inode::InodeAllocator;
use crate::kvstore::Snapshot;
use crate::membership::{PeerRegistry, Upsert};
use crate::ring::{build_ring, RingDescriptor, RingView};
use crate::types::*;
use crate::watch::{RingSubscription, RingWatchers, SubscriptionId};

/// Operations every metadata backend provides.
pub trait MetadataService: Send + Sync {
    /// Cluster-wide constants.
    fn global_metadata(&self) -> Result<GlobalMetadata, MetaError>;

    /// Identity of this handle, stable for its lifetime.
    fn identity(&self) -> &str;

    /// Known peers in registration order.
    fn list_peers(&self) -> Result<Vec<PeerInfo>, MetaError>;

    /// Registers a peer, replacing any entry with the same UUID.
    fn upsert_peer(&self, peer: PeerInfo) -> Result<(), MetaError>;

    /// Creates a volume with an empty root directory.
    fn create_volume(&self, name: &str) -> Result<(), MetaError>;

    /// Allocates a fresh inode ID.
    fn allocate_inode(&self) -> Result<InodeId, MetaError>;

    /// Creates a directory whose ancestors all exist.
    fn make_directory(&self, path: &MetaPath, record: DirRecord) -> Result<(), MetaError>;

    /// Binds a filename to an inode in its containing directory.
    fn bind_file_inode(&self, path: &MetaPath, inode: InodeRef) -> Result<(), MetaError>;

    /// Reads a directory record and the paths below it.
    fn get_directory(&self, path: &MetaPath) -> Result<(DirRecord, Vec<MetaPath>), MetaError>;

    /// Lists volume names in key order.
    fn list_volumes(&self) -> Result<Vec<String>, MetaError>;

    /// Looks up a volume's numeric ID.
    fn resolve_volume_id(&self, name: &str) -> Result<VolumeId, MetaError>;

    /// Builds the current ring.
    fn get_ring(&self) -> Result<RingView, MetaError>;

    /// Replaces the current ring and notifies subscribers.
    fn set_ring(&self, desc: RingDescriptor) -> Result<usize, MetaError>;

    /// Subscribes to ring replacements.
    fn subscribe_rings(&self) -> Result<RingSubscription, MetaError>;

    /// Cancels a ring subscription. Unknown IDs are ignored.
    fn unsubscribe_rings(&self, id: SubscriptionId) -> Result<(), MetaError>;

    /// Every key and record in the namespace tree, in key order.
    fn dump_tree(&self) -> Result<Vec<(String, DirRecord)>, MetaError>;

    /// Releases the handle.
    fn close(&self) -> Result<(), MetaError>;
}

struct AuthorityState {
    namespace: Namespace,
    inodes: InodeAllocator,
    peers: PeerRegistry,
    ring: RingDescriptor,
    watchers: RingWatchers,
}

/// The single owner of all metadata state for one process.
pub struct Authority {
    state: Mutex<AuthorityState>,
    global: GlobalMetadata,
}

impl Authority {
    /// Creates an authority with an empty namespace and an empty v1 ring.
    pub fn new(config: &MetaConfig) -> Result<Self, MetaError> {
        if config.block_size == 0 {
            return Err(MetaError::InvalidArgument("block size must be non-zero".into()));
        }
        let default_block_spec = BlockLayerSpec::parse(&config.default_block_spec)?;
        tracing::debug!(
            block_size = config.block_size,
            block_spec = %default_block_spec,
            "creating metadata authority"
        );

        Ok(Self {
            state: Mutex::new(AuthorityState {
                namespace: Namespace::new(),
                inodes: InodeAllocator::new(),
                peers: PeerRegistry::new(),
                ring: RingDescriptor::default(),
                watchers: RingWatchers::new(),
            }),
            global: GlobalMetadata {
                block_size: config.block_size,
                default_block_spec,
            },
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, AuthorityState>, MetaError> {
        self.state
            .lock()
            .map_err(|e| MetaError::LockPoisoned(e.to_string()))
    }

    /// Cluster-wide constants.
    pub fn global_metadata(&self) -> &GlobalMetadata {
        &self.global
    }

    /// The current committed namespace snapshot.
    pub fn snapshot(&self) -> Result<Snapshot<DirRecord>, MetaError> {
        Ok(self.lock()?.namespace.snapshot())
    }

    /// Creates a volume and its root directory.
    ///
    /// If the root key is somehow already in the tree the call succeeds without
    /// registering the name again.
    pub fn create_volume(&self, name: &str) -> Result<Option<VolumeId>, MetaError> {
        self.lock()?.namespace.create_volume(name)
    }

    /// Looks up a volume's numeric ID.
    pub fn resolve_volume_id(&self, name: &str) -> Result<VolumeId, MetaError> {
        self.lock()?.namespace.volumes().resolve(name)
    }

    /// Allocates a fresh inode ID.
    pub fn allocate_inode(&self) -> Result<InodeId, MetaError> {
        Ok(self.lock()?.inodes.allocate())
    }

    /// Creates a directory whose ancestors all exist.
    pub fn make_directory(&self, path: &MetaPath, record: DirRecord) -> Result<(), MetaError> {
        self.lock()?.namespace.make_directory(path, record)
    }

    /// Binds a filename to an inode in its containing directory.
    pub fn bind_file_inode(&self, path: &MetaPath, inode: InodeRef) -> Result<(), MetaError> {
        self.lock()?.namespace.bind_file_inode(path, inode)
    }

    /// Reads a directory record and the paths below it.
    pub fn get_directory(&self, path: &MetaPath) -> Result<(DirRecord, Vec<MetaPath>), MetaError> {
        let tree = self.snapshot()?;
        directory::get_directory(&tree, path)
    }

    /// Lists volume names in key order.
    pub fn list_volumes(&self) -> Result<Vec<String>, MetaError> {
        let tree = self.snapshot()?;
        Ok(directory::list_volumes(&tree))
    }

    /// Registers a peer, replacing any entry with the same UUID.
    pub fn upsert_peer(&self, peer: PeerInfo) -> Result<(), MetaError> {
        let uuid = peer.uuid;
        let outcome = self.lock()?.peers.upsert(peer);
        tracing::debug!(peer = %uuid, replaced = (outcome == Upsert::Replaced), "registered peer");
        Ok(())
    }

    /// Known peers in registration order.
    pub fn list_peers(&self) -> Result<Vec<PeerInfo>, MetaError> {
        Ok(self.lock()?.peers.list())
    }

    /// The current ring descriptor.
    pub fn ring_descriptor(&self) -> Result<RingDescriptor, MetaError> {
        Ok(self.lock()?.ring.clone())
    }

    /// Builds a ring view from the current descriptor.
    pub fn get_ring(&self) -> Result<RingView, MetaError> {
        let desc = self.ring_descriptor()?;
        build_ring(&desc)
    }

    /// Replaces the current ring and sends the built view to every subscriber.
    ///
    /// A descriptor that does not build leaves the current ring untouched.
    /// Returns how many subscribers received the new ring.
    pub fn set_ring(&self, desc: RingDescriptor) -> Result<usize, MetaError> {
        let ring = build_ring(&desc).map_err(|e| {
            tracing::warn!(version = desc.version, error = %e, "rejecting unbuildable ring");
            e
        })?;

        let mut state = self.lock()?;
        state.ring = desc;
        let delivered = state.watchers.publish(&ring);
        tracing::info!(
            ring_type = %ring.ring_type(),
            version = ring.version(),
            subscribers = delivered,
            "installed new ring"
        );
        Ok(delivered)
    }

    /// Subscribes to ring replacements.
    pub fn subscribe_rings(&self) -> Result<RingSubscription, MetaError> {
        Ok(self.lock()?.watchers.subscribe())
    }

    /// Cancels a ring subscription. Unknown IDs are ignored.
    pub fn unsubscribe_rings(&self, id: SubscriptionId) -> Result<(), MetaError> {
        self.lock()?.watchers.unsubscribe(id);
        Ok(())
    }

    /// Every key and record in the namespace tree, in key order.
    pub fn dump_tree(&self) -> Result<Vec<(String, DirRecord)>, MetaError> {
        let tree = self.snapshot()?;
        Ok(tree
            .iter()
            .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), v.clone()))
            .collect())
    }

    /// Nothing to release for the in-memory authority.
    pub fn close(&self) -> Result<(), MetaError> {
        Ok(())
    }
}

/// A client handle on a shared [`Authority`].
#[derive(Clone)]
pub struct LocalMetadata {
    identity: String,
    authority: Arc<Authority>,
}

impl LocalMetadata {
    /// Creates a handle; identity comes from the config or a new UUID.
    pub fn new(config: &MetaConfig, authority: Arc<Authority>) -> Self {
        let identity = config
            .identity
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            identity,
            authority,
        }
    }

    /// The authority behind this handle.
    pub fn authority(&self) -> &Arc<Authority> {
        &self.authority
    }
}

impl MetadataService for LocalMetadata {
    fn global_metadata(&self) -> Result<GlobalMetadata, MetaError> {
        Ok(self.authority.global_metadata().clone())
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn list_peers(&self) -> Result<Vec<PeerInfo>, MetaError> {
        self.authority.list_peers()
    }

    fn upsert_peer(&self, peer: PeerInfo) -> Result<(), MetaError> {
        self.authority.upsert_peer(peer)
    }

    fn create_volume(&self, name: &str) -> Result<(), MetaError> {
        self.authority.create_volume(name).map(|_| ())
    }

    fn allocate_inode(&self) -> Result<InodeId, MetaError> {
        self.authority.allocate_inode()
    }

    fn make_directory(&self, path: &MetaPath, record: DirRecord) -> Result<(), MetaError> {
        self.authority.make_directory(path, record)
    }

    fn bind_file_inode(&self, path: &MetaPath, inode: InodeRef) -> Result<(), MetaError> {
        self.authority.bind_file_inode(path, inode)
    }

    fn get_directory(&self, path: &MetaPath) -> Result<(DirRecord, Vec<MetaPath>), MetaError> {
        self.authority.get_directory(path)
    }

    fn list_volumes(&self) -> Result<Vec<String>, MetaError> {
        self.authority.list_volumes()
    }

    fn resolve_volume_id(&self, name: &str) -> Result<VolumeId, MetaError> {
        self.authority.resolve_volume_id(name)
    }

    fn get_ring(&self) -> Result<RingView, MetaError> {
        self.authority.get_ring()
    }

    fn set_ring(&self, desc: RingDescriptor) -> Result<usize, MetaError> {
        self.authority.set_ring(desc)
    }

    fn subscribe_rings(&self) -> Result<RingSubscription, MetaError> {
        self.authority.subscribe_rings()
    }

    fn unsubscribe_rings(&self, id: SubscriptionId) -> Result<(), MetaError> {
        self.authority.unsubscribe_rings(id)
    }

    fn dump_tree(&self) -> Result<Vec<(String, DirRecord)>, MetaError> {
        self.authority.dump_tree()
    }

    fn close(&self) -> Result<(), MetaError> {
        self.authority.close()
    }
}
