//! In-memory transport
//!
//! A process-local hub for tests and simulations: topics fan out over
//! broadcast channels, and proposal streams are paired duplex pipes. The
//! hub does not filter self-delivery, so the loops' self filters are
//! exercised for real. Peer ids are derived from real keys, so identity
//! recovery behaves exactly as on the wire.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use libp2p::PeerId;
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use quoranet_crypto::PrivateKey;

use crate::error::P2pError;
use crate::identity::host_keypair;
use crate::transport::{Gossip, GossipMessage, StreamHost, Subscription, Topic};
use crate::P2pResult;

/// Stream type served by the in-memory transport.
pub type MemoryStream = Compat<DuplexStream>;

type StreamInbox = mpsc::Sender<(PeerId, MemoryStream)>;

/// Shared hub connecting any number of in-process transports.
#[derive(Default)]
pub struct MemoryHub {
    topics: Mutex<HashMap<String, broadcast::Sender<GossipMessage>>>,
    inboxes: Mutex<HashMap<PeerId, StreamInbox>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the hub with the given node key; the transport's peer id is
    /// derived from it the same way the production host derives identity.
    pub fn connect(self: &Arc<Self>, key: &PrivateKey) -> P2pResult<Arc<MemoryTransport>> {
        let host = host_keypair(key)?;
        let peer_id = PeerId::from(host.public());

        let (tx, rx) = mpsc::channel(16);
        self.inboxes.lock().insert(peer_id, tx);

        Ok(Arc::new(MemoryTransport {
            hub: self.clone(),
            peer_id,
            inbound: tokio::sync::Mutex::new(rx),
        }))
    }

    fn topic_sender(&self, topic: &str) -> broadcast::Sender<GossipMessage> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(128).0)
            .clone()
    }
}

/// One node's handle onto a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    peer_id: PeerId,
    inbound: tokio::sync::Mutex<mpsc::Receiver<(PeerId, MemoryStream)>>,
}

#[async_trait]
impl Gossip for MemoryTransport {
    type Topic = MemoryTopic;
    type Subscription = MemorySubscription;

    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn subscribe(&self, topic: &str) -> P2pResult<(MemoryTopic, MemorySubscription)> {
        let tx = self.hub.topic_sender(topic);
        let rx = tx.subscribe();
        Ok((
            MemoryTopic {
                tx,
                from: self.peer_id,
            },
            MemorySubscription { rx },
        ))
    }
}

pub struct MemoryTopic {
    tx: broadcast::Sender<GossipMessage>,
    from: PeerId,
}

#[async_trait]
impl Topic for MemoryTopic {
    async fn publish(&self, data: Vec<u8>) -> P2pResult<()> {
        // no subscribers yet is not a failure
        let _ = self.tx.send(GossipMessage {
            from: self.from,
            data,
        });
        Ok(())
    }
}

pub struct MemorySubscription {
    rx: broadcast::Receiver<GossipMessage>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<GossipMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl StreamHost for MemoryTransport {
    type Stream = MemoryStream;

    async fn open_stream(&self, peer: PeerId, _protocol: &str) -> P2pResult<MemoryStream> {
        let inbox = self
            .hub
            .inboxes
            .lock()
            .get(&peer)
            .cloned()
            .ok_or_else(|| P2pError::StreamOpen(format!("unknown peer {peer}")))?;

        let (near, far) = tokio::io::duplex(256 * 1024);
        inbox
            .send((self.peer_id, far.compat()))
            .await
            .map_err(|_| P2pError::StreamOpen(format!("peer {peer} is gone")))?;
        Ok(near.compat())
    }

    async fn accept(&self) -> Option<(PeerId, MemoryStream)> {
        self.inbound.lock().await.recv().await
    }
}
