//! Ring descriptors and the placement views built from them.
//!
//! A [`RingDescriptor`] is the versioned, serializable description of how
//! blocks map to peers. [`build_ring`] turns it into a [`RingView`] that can
//! answer placement queries. Type-specific parameters travel in the
//! descriptor payload as bincode.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{BlockRef, MetaError};

/// Kind of ring described by a descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingType {
    /// No peers; places nothing.
    Empty,
    /// Every block lives on one peer.
    Single,
    /// Blocks are hashed onto a fixed peer list.
    Mod,
}

impl RingType {
    /// Numeric tag of the ring type.
    pub fn as_u32(self) -> u32 {
        match self {
            RingType::Empty => 0,
            RingType::Single => 1,
            RingType::Mod => 2,
        }
    }

    /// Ring type for a numeric tag.
    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(RingType::Empty),
            1 => Some(RingType::Single),
            2 => Some(RingType::Mod),
            _ => None,
        }
    }
}

impl fmt::Display for RingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingType::Empty => write!(f, "empty"),
            RingType::Single => write!(f, "single"),
            RingType::Mod => write!(f, "mod"),
        }
    }
}

/// Parameters of a [`RingType::Single`] ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleParams {
    /// The only peer
    pub peer: Uuid,
}

/// Parameters of a [`RingType::Mod`] ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModParams {
    /// Member peers, in placement order
    pub peers: Vec<Uuid>,
    /// Copies kept of each block
    pub replication: usize,
}

/// Versioned description of a ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingDescriptor {
    /// Ring kind
    pub ring_type: RingType,
    /// Descriptor version, increasing with every replacement
    pub version: u32,
    /// bincode-encoded type-specific parameters
    pub payload: Vec<u8>,
}

impl RingDescriptor {
    /// An empty ring at the given version.
    pub fn empty(version: u32) -> Self {
        Self {
            ring_type: RingType::Empty,
            version,
            payload: Vec::new(),
        }
    }

    /// A ring placing every block on `peer`.
    pub fn single(version: u32, peer: Uuid) -> Result<Self, MetaError> {
        Ok(Self {
            ring_type: RingType::Single,
            version,
            payload: encode(&SingleParams { peer })?,
        })
    }

    /// A ring hashing blocks over `peers`, keeping `replication` copies.
    pub fn modulo(version: u32, peers: Vec<Uuid>, replication: usize) -> Result<Self, MetaError> {
        Ok(Self {
            ring_type: RingType::Mod,
            version,
            payload: encode(&ModParams { peers, replication })?,
        })
    }
}

impl Default for RingDescriptor {
    fn default() -> Self {
        Self::empty(1)
    }
}

fn encode<T: Serialize>(params: &T) -> Result<Vec<u8>, MetaError> {
    bincode::serialize(params).map_err(|e| MetaError::InvalidArgument(e.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(desc: &'a RingDescriptor) -> Result<T, MetaError> {
    bincode::deserialize(&desc.payload).map_err(|e| {
        MetaError::InvalidArgument(format!(
            "{} ring v{} has a malformed payload: {}",
            desc.ring_type, desc.version, e
        ))
    })
}

/// A usable placement function built from a descriptor.
pub trait Ring: Send + Sync + fmt::Debug {
    /// Kind of this ring.
    fn ring_type(&self) -> RingType;

    /// Version of the descriptor this ring was built from.
    fn version(&self) -> u32;

    /// All member peers.
    fn members(&self) -> &[Uuid];

    /// Number of peers each block is placed on.
    fn replication(&self) -> usize;

    /// Peers holding `block`, primary first.
    fn peers_for(&self, block: &BlockRef) -> Vec<Uuid>;
}

/// Shared handle to a built ring.
pub type RingView = Arc<dyn Ring>;

/// Builds a ring view from a descriptor.
pub fn build_ring(desc: &RingDescriptor) -> Result<RingView, MetaError> {
    match desc.ring_type {
        RingType::Empty => Ok(Arc::new(EmptyRing {
            version: desc.version,
        })),
        RingType::Single => {
            let params: SingleParams = decode(desc)?;
            Ok(Arc::new(SingleRing {
                version: desc.version,
                peers: vec![params.peer],
            }))
        }
        RingType::Mod => {
            let params: ModParams = decode(desc)?;
            if params.peers.is_empty() {
                return Err(MetaError::InvalidArgument(format!(
                    "mod ring v{} has no peers",
                    desc.version
                )));
            }
            if params.replication == 0 || params.replication > params.peers.len() {
                return Err(MetaError::InvalidArgument(format!(
                    "mod ring v{}: replication {} not in 1..={}",
                    desc.version,
                    params.replication,
                    params.peers.len()
                )));
            }
            Ok(Arc::new(ModRing {
                version: desc.version,
                peers: params.peers,
                replication: params.replication,
            }))
        }
    }
}

#[derive(Debug)]
struct EmptyRing {
    version: u32,
}

impl Ring for EmptyRing {
    fn ring_type(&self) -> RingType {
        RingType::Empty
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn members(&self) -> &[Uuid] {
        &[]
    }

    fn replication(&self) -> usize {
        0
    }

    fn peers_for(&self, _block: &BlockRef) -> Vec<Uuid> {
        Vec::new()
    }
}

#[derive(Debug)]
struct SingleRing {
    version: u32,
    peers: Vec<Uuid>,
}

impl Ring for SingleRing {
    fn ring_type(&self) -> RingType {
        RingType::Single
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn members(&self) -> &[Uuid] {
        &self.peers
    }

    fn replication(&self) -> usize {
        1
    }

    fn peers_for(&self, _block: &BlockRef) -> Vec<Uuid> {
        self.peers.clone()
    }
}

#[derive(Debug)]
struct ModRing {
    version: u32,
    peers: Vec<Uuid>,
    replication: usize,
}

impl Ring for ModRing {
    fn ring_type(&self) -> RingType {
        RingType::Mod
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn members(&self) -> &[Uuid] {
        &self.peers
    }

    fn replication(&self) -> usize {
        self.replication
    }

    fn peers_for(&self, block: &BlockRef) -> Vec<Uuid> {
        let hash = blake3::hash(&block.to_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        let n = self.peers.len();
        let start = (u64::from_le_bytes(head) % n as u64) as usize;
        (0..self.replication)
            .map(|i| self.peers[(start + i) % n])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InodeId, InodeRef, VolumeId};

    fn block(i: u64) -> BlockRef {
        BlockRef::new(InodeRef::new(VolumeId::new(1), InodeId::new(9)), i)
    }

    #[test]
    fn test_default_is_empty_v1() {
        let ring = build_ring(&RingDescriptor::default()).unwrap();
        assert_eq!(ring.ring_type(), RingType::Empty);
        assert_eq!(ring.version(), 1);
        assert!(ring.members().is_empty());
        assert!(ring.peers_for(&block(0)).is_empty());
    }

    #[test]
    fn test_single_ring() {
        let peer = Uuid::new_v4();
        let ring = build_ring(&RingDescriptor::single(2, peer).unwrap()).unwrap();
        assert_eq!(ring.ring_type(), RingType::Single);
        assert_eq!(ring.peers_for(&block(5)), vec![peer]);
    }

    #[test]
    fn test_mod_ring_placement() {
        let peers: Vec<_> = (0..5).map(|_| Uuid::new_v4()).collect();
        let ring = build_ring(&RingDescriptor::modulo(3, peers.clone(), 2).unwrap()).unwrap();
        for i in 0..64 {
            let placed = ring.peers_for(&block(i));
            assert_eq!(placed.len(), 2);
            assert_ne!(placed[0], placed[1]);
            assert!(placed.iter().all(|p| peers.contains(p)));
            assert_eq!(placed, ring.peers_for(&block(i)));
        }
    }

    #[test]
    fn test_mod_ring_rejects_bad_params() {
        let peers = vec![Uuid::new_v4()];
        assert!(build_ring(&RingDescriptor::modulo(2, Vec::new(), 1).unwrap()).is_err());
        assert!(build_ring(&RingDescriptor::modulo(2, peers.clone(), 0).unwrap()).is_err());
        assert!(build_ring(&RingDescriptor::modulo(2, peers, 2).unwrap()).is_err());
    }

    #[test]
    fn test_malformed_payload() {
        let desc = RingDescriptor {
            ring_type: RingType::Single,
            version: 2,
            payload: vec![1, 2],
        };
        assert!(matches!(build_ring(&desc), Err(MetaError::InvalidArgument(_))));
    }

    #[test]
    fn test_type_tags() {
        for t in [RingType::Empty, RingType::Single, RingType::Mod] {
            assert_eq!(RingType::from_u32(t.as_u32()), Some(t));
        }
        assert_eq!(RingType::from_u32(7), None);
    }
}
