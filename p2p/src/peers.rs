//! Peer tracking
//!
//! The handlers only ever read the peer set; the transport updates it as
//! connections come and go.

use std::collections::HashSet;
use std::sync::Arc;

use libp2p::PeerId;
use parking_lot::RwLock;

/// Set of currently connected peers.
#[derive(Debug, Default)]
pub struct PeerList {
    peers: RwLock<HashSet<PeerId>>,
}

pub type SharedPeerList = Arc<PeerList>;

impl PeerList {
    pub fn new() -> SharedPeerList {
        Arc::new(Self::default())
    }

    pub fn add(&self, peer: PeerId) {
        self.peers.write().insert(peer);
    }

    pub fn remove(&self, peer: &PeerId) {
        self.peers.write().remove(peer);
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.read().contains(peer)
    }

    pub fn all(&self) -> Vec<PeerId> {
        self.peers.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let list = PeerList::new();
        let peer = PeerId::random();

        list.add(peer);
        assert!(list.contains(&peer));
        assert_eq!(list.len(), 1);

        // adding twice is a no-op
        list.add(peer);
        assert_eq!(list.len(), 1);

        list.remove(&peer);
        assert!(list.is_empty());
    }
}
