//! Registry of storage peers known to the cluster.
//!
//! Peers are keyed by UUID. Registering a peer that is already known
//! replaces its entry in place; new peers are appended, so the listing keeps
//! first-registration order. There is no removal.

use crate::types::PeerInfo;

/// Outcome of registering a peer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Upsert {
    /// The peer was not known and was appended.
    Inserted,
    /// An existing entry with the same UUID was replaced.
    Replaced,
}

/// Ordered list of peer descriptors, unique by UUID.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Vec<PeerInfo>,
}

impl PeerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a peer.
    pub fn upsert(&mut self, peer: PeerInfo) -> Upsert {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.uuid == peer.uuid) {
            *existing = peer;
            return Upsert::Replaced;
        }
        self.peers.push(peer);
        Upsert::Inserted
    }

    /// Returns a copy of the current peer list.
    pub fn list(&self) -> Vec<PeerInfo> {
        self.peers.clone()
    }
}
