//! Node orchestrator
//!
//! Owns the four publish channels (one producer: the engine's callbacks;
//! one consumer: the matching publish loop), spawns the gossip loops and
//! the inbound proposal-stream acceptor, and announces proposed blocks to
//! the peer set. Channels are bounded; a full channel blocks the caller
//! rather than dropping a vote.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quoranet_core::{
    AckRes, Block, BlockProp, BlockStore, ConsensusReset, DiscoveryRequest, DiscoveryResponse,
    Engine, Hash, NodeConfig, Signature,
};
use quoranet_crypto::{KeyPair, KeyType, PublicKey};
use quoranet_p2p::{
    advertise_block, handle_propose_stream, start_ack_gossip, start_discovery_request_gossip,
    start_discovery_response_gossip, start_reset_gossip, Gossip, P2pError, PeerId, SharedPeerList,
    StreamHost, PROTOCOL_BLOCK_PROPOSE,
};

type P2pResult<T> = Result<T, P2pError>;

struct Receivers {
    ack_rx: mpsc::Receiver<AckRes>,
    disc_req_rx: mpsc::Receiver<DiscoveryRequest>,
    disc_resp_rx: mpsc::Receiver<DiscoveryResponse>,
    reset_rx: mpsc::Receiver<ConsensusReset>,
}

/// A running QUORANET gossip node.
pub struct Node<G: Gossip, S: StreamHost> {
    config: NodeConfig,
    keypair: KeyPair,
    ce: Arc<dyn Engine>,
    bki: Arc<dyn BlockStore>,
    gossip: Arc<G>,
    streams: Arc<S>,
    peers: SharedPeerList,
    cancel: CancellationToken,

    ack_tx: mpsc::Sender<AckRes>,
    disc_req_tx: mpsc::Sender<DiscoveryRequest>,
    disc_resp_tx: mpsc::Sender<DiscoveryResponse>,
    reset_tx: mpsc::Sender<ConsensusReset>,

    receivers: Mutex<Option<Receivers>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<G: Gossip, S: StreamHost> Node<G, S> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: NodeConfig,
        keypair: KeyPair,
        ce: Arc<dyn Engine>,
        bki: Arc<dyn BlockStore>,
        gossip: Arc<G>,
        streams: Arc<S>,
        peers: SharedPeerList,
        cancel: CancellationToken,
    ) -> Self {
        let (ack_tx, ack_rx) = mpsc::channel(config.consensus.ack_channel_capacity);
        let (disc_req_tx, disc_req_rx) = mpsc::channel(config.consensus.discovery_channel_capacity);
        let (disc_resp_tx, disc_resp_rx) =
            mpsc::channel(config.consensus.discovery_channel_capacity);
        let (reset_tx, reset_rx) = mpsc::channel(config.consensus.reset_channel_capacity);

        Self {
            config,
            keypair,
            ce,
            bki,
            gossip,
            streams,
            peers,
            cancel,
            ack_tx,
            disc_req_tx,
            disc_resp_tx,
            reset_tx,
            receivers: Mutex::new(Some(Receivers {
                ack_rx,
                disc_req_rx,
                disc_resp_rx,
                reset_rx,
            })),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the gossip loops and the inbound proposal-stream acceptor.
    pub async fn start(&self) -> P2pResult<()> {
        let rx = self
            .receivers
            .lock()
            .take()
            .ok_or(P2pError::ChannelClosed)?;

        let mut tasks = Vec::new();
        tasks.extend(
            start_ack_gossip(
                self.cancel.clone(),
                self.gossip.clone(),
                self.ce.clone(),
                rx.ack_rx,
            )
            .await?,
        );
        tasks.extend(
            start_discovery_request_gossip(
                self.cancel.clone(),
                self.gossip.clone(),
                self.bki.clone(),
                rx.disc_req_rx,
                self.disc_resp_tx.clone(),
            )
            .await?,
        );
        tasks.extend(
            start_discovery_response_gossip(
                self.cancel.clone(),
                self.gossip.clone(),
                self.ce.clone(),
                rx.disc_resp_rx,
            )
            .await?,
        );
        tasks.extend(
            start_reset_gossip(
                self.cancel.clone(),
                self.gossip.clone(),
                self.ce.clone(),
                rx.reset_rx,
            )
            .await?,
        );

        // one task accepting proposal streams, one task per stream
        let streams = self.streams.clone();
        let ce = self.ce.clone();
        let cancel = self.cancel.clone();
        let op_timeout = self.blk_send_timeout();
        tasks.push(tokio::spawn(async move {
            loop {
                let inbound = tokio::select! {
                    _ = cancel.cancelled() => return,
                    inbound = streams.accept() => inbound,
                };
                let Some((peer, stream)) = inbound else { return };
                debug!(%peer, "inbound block proposal stream");

                let ce = ce.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_propose_stream(stream, ce, op_timeout).await {
                        warn!(%peer, error = %e, "block proposal stream failed");
                    }
                });
            }
        }));

        self.tasks.lock().extend(tasks);
        info!(name = %self.config.name, peer = %self.gossip.local_peer_id(), "node started");
        Ok(())
    }

    /// Cancel every task and wait for them to drain.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        info!("node stopped");
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.gossip.local_peer_id()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    fn blk_send_timeout(&self) -> Duration {
        Duration::from_millis(self.config.consensus.blk_send_timeout_ms)
    }

    /// Engine callback: gossip the result of executing a proposed block.
    /// The node attaches its own signer identity to the vote.
    pub async fn send_ack(
        &self,
        ack: bool,
        height: i64,
        blk_hash: Hash,
        app_hash: Option<Hash>,
        signature: Vec<u8>,
    ) -> P2pResult<()> {
        self.ack_tx
            .send(AckRes {
                ack,
                height,
                blk_hash,
                app_hash,
                signature: Signature::new(
                    signature,
                    self.keypair.public_key().to_bytes(),
                    self.keypair.key_type(),
                ),
            })
            .await
            .map_err(|_| P2pError::ChannelClosed)
    }

    /// Engine callback: ask the network for its best height.
    pub async fn send_discovery_request(&self) -> P2pResult<()> {
        debug!("sending discovery request");
        self.disc_req_tx
            .send(DiscoveryRequest)
            .await
            .map_err(|_| P2pError::ChannelClosed)
    }

    /// Engine callback: answer a discovery request.
    pub async fn send_discovery_response(&self, best_height: i64) -> P2pResult<()> {
        debug!(height = best_height, "sending discovery response");
        self.disc_resp_tx
            .send(DiscoveryResponse { best_height })
            .await
            .map_err(|_| P2pError::ChannelClosed)
    }

    /// Engine callback: order validators back to `to_height`.
    pub async fn send_reset(&self, to_height: i64, tx_ids: Vec<Hash>) -> P2pResult<()> {
        self.reset_tx
            .send(ConsensusReset { to_height, tx_ids })
            .await
            .map_err(|_| P2pError::ChannelClosed)
    }

    /// Advertise a signed proposed block to every peer; each peer decides
    /// whether to pull the contents. Per-peer failures do not stop the
    /// sweep, and duplicate suppression is the engine's job.
    pub async fn announce_block_prop(&self, block: &Block) {
        let raw = block.encode();
        let blk_hash = block.hash();
        let height = block.header.height;

        debug!(hash = %blk_hash, height, txs = block.txns.len(), size = raw.len(),
            "announcing proposed block");

        let peers = self.peers.all();
        if peers.is_empty() {
            warn!("no peers to advertise block to");
            return;
        }

        let prop = BlockProp {
            height,
            hash: blk_hash,
            prev_hash: block.header.prev_hash,
            stamp: block.header.timestamp.as_millis(),
            leader_sig: block.signature.clone(),
        };
        let me = self.gossip.local_peer_id();
        let op_timeout = self.blk_send_timeout();

        for peer in peers {
            if peer == me {
                continue;
            }
            debug!(hash = %blk_hash, height, %peer, "advertising block proposal to peer");

            let mut stream = match self.streams.open_stream(peer, PROTOCOL_BLOCK_PROPOSE).await {
                Ok(stream) => stream,
                Err(e) => {
                    info!(%peer, error = %e, "could not open proposal stream");
                    continue;
                }
            };
            if let Err(e) = advertise_block(&mut stream, &prop, &raw, op_timeout).await {
                info!(%peer, error = %e, "proposal advertisement not taken");
            }
        }
    }
}

/// Builder for [`Node`], defaulting the config and identity.
pub struct NodeBuilder {
    config: NodeConfig,
    keypair: Option<KeyPair>,
    ce: Arc<dyn Engine>,
    bki: Arc<dyn BlockStore>,
    cancel: CancellationToken,
}

impl NodeBuilder {
    pub fn new(ce: Arc<dyn Engine>, bki: Arc<dyn BlockStore>) -> Self {
        Self {
            config: NodeConfig::default(),
            keypair: None,
            ce,
            bki,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn keypair(mut self, keypair: KeyPair) -> Self {
        self.keypair = Some(keypair);
        self
    }

    /// Share a cancellation token with the rest of the process.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build<G: Gossip, S: StreamHost>(
        self,
        gossip: Arc<G>,
        streams: Arc<S>,
        peers: SharedPeerList,
    ) -> Node<G, S> {
        let keypair = self
            .keypair
            .unwrap_or_else(|| KeyPair::generate(KeyType::Ed25519));
        Node::new(
            self.config, keypair, self.ce, self.bki, gossip, streams, peers, self.cancel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quoranet_core::{sign_vote, Role, Timestamp};
    use quoranet_p2p::{peer_id_for, MemoryHub, MemoryTransport, PeerList};

    #[derive(Debug)]
    enum Event {
        Accept { height: i64 },
        Block(Block),
        Ack { sender: Vec<u8>, ack: AckRes },
        Discovery { sender: Vec<u8>, best_height: i64 },
        Reset { to_height: i64, sender: Vec<u8> },
    }

    struct RecordingEngine {
        role: Role,
        accept: bool,
        events: mpsc::UnboundedSender<Event>,
    }

    impl RecordingEngine {
        fn new(role: Role, accept: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    role,
                    accept,
                    events: tx,
                }),
                rx,
            )
        }
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        fn role(&self) -> Role {
            self.role
        }

        async fn accept_proposal(
            &self,
            height: i64,
            _blk_hash: Hash,
            _prev_hash: Hash,
            _leader_sig: &[u8],
            _stamp: i64,
        ) -> bool {
            let _ = self.events.send(Event::Accept { height });
            self.accept
        }

        async fn notify_block_proposal(&self, block: Block) {
            let _ = self.events.send(Event::Block(block));
        }

        async fn notify_ack(&self, sender_pub_key: Vec<u8>, ack: AckRes) {
            let _ = self.events.send(Event::Ack {
                sender: sender_pub_key,
                ack,
            });
        }

        async fn notify_discovery_message(&self, sender_pub_key: Vec<u8>, best_height: i64) {
            let _ = self.events.send(Event::Discovery {
                sender: sender_pub_key,
                best_height,
            });
        }

        async fn notify_reset_state(
            &self,
            to_height: i64,
            _tx_ids: Vec<Hash>,
            sender_pub_key: Vec<u8>,
        ) {
            let _ = self.events.send(Event::Reset {
                to_height,
                sender: sender_pub_key,
            });
        }
    }

    struct Best(i64);
    impl BlockStore for Best {
        fn best(&self) -> (i64, Hash, Hash) {
            (self.0, Hash::ZERO, Hash::ZERO)
        }
    }

    async fn recv(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    struct TestNode {
        node: Node<MemoryTransport, MemoryTransport>,
        key: KeyPair,
        events: mpsc::UnboundedReceiver<Event>,
    }

    async fn spawn_node(
        hub: &Arc<MemoryHub>,
        role: Role,
        accept: bool,
        best: i64,
        peers: SharedPeerList,
    ) -> TestNode {
        let key = KeyPair::generate(KeyType::Ed25519);
        let transport = hub.connect(key.private_key()).unwrap();
        let (ce, events) = RecordingEngine::new(role, accept);

        let node = NodeBuilder::new(ce, Arc::new(Best(best)))
            .keypair(key.clone())
            .build(transport.clone(), transport, peers);
        node.start().await.unwrap();
        TestNode { node, key, events }
    }

    fn shared_peers(keys: &[&KeyPair]) -> SharedPeerList {
        let peers = PeerList::new();
        for key in keys {
            peers.add(peer_id_for(key.public_key()).unwrap());
        }
        peers
    }

    #[tokio::test]
    async fn test_announce_and_pull_between_nodes() {
        let hub = MemoryHub::new();
        let leader_key = KeyPair::generate(KeyType::Ed25519);
        let follower_key = KeyPair::generate(KeyType::Ed25519);
        let peers = shared_peers(&[&leader_key, &follower_key]);

        let leader_transport = hub.connect(leader_key.private_key()).unwrap();
        let (leader_ce, _leader_events) = RecordingEngine::new(Role::Leader, false);
        let leader = NodeBuilder::new(leader_ce, Arc::new(Best(0)))
            .keypair(leader_key.clone())
            .build(leader_transport.clone(), leader_transport, peers.clone());
        leader.start().await.unwrap();

        let follower_transport = hub.connect(follower_key.private_key()).unwrap();
        let (follower_ce, mut follower_events) = RecordingEngine::new(Role::Validator, true);
        let follower = NodeBuilder::new(follower_ce, Arc::new(Best(0)))
            .keypair(follower_key.clone())
            .build(follower_transport.clone(), follower_transport, peers);
        follower.start().await.unwrap();

        let mut blk = Block::new(
            3,
            Hash::digest(b"prev"),
            Hash::digest(b"app"),
            Hash::digest(b"vals"),
            Timestamp::from_millis(1_729_890_593_000),
            vec![],
        );
        blk.sign(leader_key.private_key());
        leader.announce_block_prop(&blk).await;

        assert!(matches!(
            recv(&mut follower_events).await,
            Event::Accept { height: 3 }
        ));
        match recv(&mut follower_events).await {
            Event::Block(got) => assert_eq!(got, blk),
            other => panic!("unexpected event: {other:?}"),
        }

        leader.shutdown().await;
        follower.shutdown().await;
    }

    #[tokio::test]
    async fn test_ack_reaches_leader_once() {
        let hub = MemoryHub::new();
        let peers = PeerList::new();

        let mut leader = spawn_node(&hub, Role::Leader, true, 0, peers.clone()).await;
        let mut follower = spawn_node(&hub, Role::Validator, true, 0, peers).await;

        let blk_hash = Hash::digest(b"blk");
        let app_hash = Hash::digest(b"app");
        let sig = sign_vote(blk_hash, true, Some(&app_hash), follower.key.private_key()).unwrap();
        follower
            .node
            .send_ack(true, 9, blk_hash, Some(app_hash), sig.data)
            .await
            .unwrap();

        match recv(&mut leader.events).await {
            Event::Ack { sender, ack } => {
                assert_eq!(sender, follower.key.public_key().to_bytes());
                assert_eq!(ack.height, 9);
                assert_eq!(ack.blk_hash, blk_hash);
                assert_eq!(
                    ack.signature.pub_key,
                    follower.key.public_key().to_bytes()
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // exactly once on the leader, nothing self-delivered to the voter
        assert!(leader.events.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(follower.events.try_recv().is_err());

        leader.node.shutdown().await;
        follower.node.shutdown().await;
    }

    #[tokio::test]
    async fn test_discovery_round_trip_through_nodes() {
        let hub = MemoryHub::new();
        let peers = PeerList::new();

        // the leader is behind and asks the network where it is
        let mut leader = spawn_node(&hub, Role::Leader, true, 2, peers.clone()).await;
        let mut helper = spawn_node(&hub, Role::Validator, true, 42, peers).await;

        leader.node.send_discovery_request().await.unwrap();

        match recv(&mut leader.events).await {
            Event::Discovery {
                sender,
                best_height,
            } => {
                assert_eq!(sender, helper.key.public_key().to_bytes());
                assert_eq!(best_height, 42);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // the helper is not a leader: no discovery deliveries to it
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(helper.events.try_recv().is_err());

        leader.node.shutdown().await;
        helper.node.shutdown().await;
    }

    #[tokio::test]
    async fn test_reset_carries_leader_identity() {
        let hub = MemoryHub::new();
        let peers = PeerList::new();

        let mut leader = spawn_node(&hub, Role::Leader, true, 0, peers.clone()).await;
        let mut follower = spawn_node(&hub, Role::Validator, true, 0, peers).await;

        leader
            .node
            .send_reset(17, vec![Hash::digest(b"t1")])
            .await
            .unwrap();

        match recv(&mut follower.events).await {
            Event::Reset { to_height, sender } => {
                assert_eq!(to_height, 17);
                assert_eq!(sender, leader.key.public_key().to_bytes());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        leader.node.shutdown().await;
        follower.node.shutdown().await;
    }
}
