//! QUORANET P2P Networking
//!
//! Couples the peer-to-peer transport to the consensus engine:
//! - pull-based block-proposal announcements over bidirectional streams
//! - ACK, discovery, and consensus-reset gossip over pub/sub topics
//! - a libp2p production transport and an in-memory transport for tests
//!
//! The gossip loops and the proposal protocol are written against the
//! [`transport`] traits, so the same code runs over both transports.

pub mod behaviour;
pub mod gossip;
pub mod identity;
pub mod memory;
pub mod peers;
pub mod propose;
pub mod service;
pub mod transport;

mod error;

#[cfg(test)]
pub(crate) mod testing;

pub use error::P2pError;
pub use gossip::{
    start_ack_gossip, start_discovery_request_gossip, start_discovery_response_gossip,
    start_reset_gossip,
};
pub use identity::{host_keypair, peer_id_for, pubkey_from_peer_id};
pub use memory::{MemoryHub, MemoryTransport};
pub use peers::{PeerList, SharedPeerList};
pub use propose::{advertise_block, handle_propose_stream};
pub use service::{spawn_libp2p, Libp2pGossip, Libp2pStreams};
pub use transport::{
    Gossip, GossipMessage, StreamHost, Subscription, Topic, PROTOCOL_BLOCK_PROPOSE, TOPIC_ACKS,
    TOPIC_DISC_REQ, TOPIC_DISC_RESP, TOPIC_RESET,
};

// The transport's peer identifier, re-exported so dependents do not need a
// direct libp2p dependency to hold one.
pub use libp2p::PeerId;

/// Result type for p2p operations
pub type P2pResult<T> = Result<T, P2pError>;
