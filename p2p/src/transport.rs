//! Transport abstraction
//!
//! The gossip core assumes a host that exposes topic-based pub/sub and
//! bidirectional byte streams keyed by a protocol id. Two implementations
//! exist: the libp2p service ([`crate::service`]) for production and the
//! in-memory hub ([`crate::memory`]) for tests and local simulation.

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite};
use libp2p::PeerId;

use crate::P2pResult;

/// Topic names for gossipsub. Changing any of these breaks network
/// compatibility.
pub const TOPIC_ACKS: &str = "quoranet/acks/1";
pub const TOPIC_DISC_REQ: &str = "quoranet/discovery-req/1";
pub const TOPIC_DISC_RESP: &str = "quoranet/discovery-resp/1";
pub const TOPIC_RESET: &str = "quoranet/reset/1";

/// Protocol id for the block-proposal pull stream.
pub const PROTOCOL_BLOCK_PROPOSE: &str = "/quoranet/blkprop/1.0.0";

/// A message received on a topic, tagged with its originating peer.
#[derive(Debug, Clone)]
pub struct GossipMessage {
    pub from: PeerId,
    pub data: Vec<u8>,
}

/// Publish handle for one topic.
#[async_trait]
pub trait Topic: Send + Sync + 'static {
    async fn publish(&self, data: Vec<u8>) -> P2pResult<()>;
}

/// Receive handle for one topic. Dropping the subscription cancels it.
#[async_trait]
pub trait Subscription: Send + 'static {
    /// Next message on the topic; `None` once the subscription ends.
    async fn next(&mut self) -> Option<GossipMessage>;
}

/// Topic-based pub/sub as provided by the host.
#[async_trait]
pub trait Gossip: Send + Sync + 'static {
    type Topic: Topic;
    type Subscription: Subscription;

    /// This node's peer id on the transport.
    fn local_peer_id(&self) -> PeerId;

    /// Join a topic, returning the publish and receive halves.
    async fn subscribe(&self, topic: &str) -> P2pResult<(Self::Topic, Self::Subscription)>;
}

/// Stream transport as provided by the host.
#[async_trait]
pub trait StreamHost: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open an outbound stream to `peer` for `protocol`.
    async fn open_stream(&self, peer: PeerId, protocol: &str) -> P2pResult<Self::Stream>;

    /// Accept the next inbound stream for the host's registered protocol;
    /// `None` once the host shuts down.
    async fn accept(&self) -> Option<(PeerId, Self::Stream)>;
}
