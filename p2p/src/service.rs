//! libp2p transport service
//!
//! Owns the swarm on a dedicated task; the [`Gossip`] and [`StreamHost`]
//! handles it returns talk to the task over a command channel, so the
//! gossip loops never touch the swarm directly.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use libp2p::{
    gossipsub::{self, IdentTopic, TopicHash},
    identity, mdns, noise,
    swarm::SwarmEvent,
    tcp, yamux, Multiaddr, PeerId, StreamProtocol,
};
use libp2p_stream as stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quoranet_core::NetworkConfig;

use crate::behaviour::{QuoranetBehaviour, QuoranetBehaviourEvent};
use crate::error::P2pError;
use crate::peers::SharedPeerList;
use crate::transport::{Gossip, GossipMessage, StreamHost, Subscription, Topic};
use crate::{P2pResult, PROTOCOL_BLOCK_PROPOSE};

enum Command {
    Subscribe {
        topic: String,
        reply: oneshot::Sender<P2pResult<mpsc::Receiver<GossipMessage>>>,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: oneshot::Sender<P2pResult<()>>,
    },
}

/// Pub/sub handle backed by the swarm task.
pub struct Libp2pGossip {
    peer_id: PeerId,
    cmd_tx: mpsc::Sender<Command>,
}

/// Stream handle backed by the swarm's stream control.
pub struct Libp2pStreams {
    control: stream::Control,
    incoming: tokio::sync::Mutex<stream::IncomingStreams>,
}

/// Start the libp2p service: build the swarm, bind the listen address,
/// dial the bootstrap peers, and hand back the transport handles.
pub async fn spawn_libp2p(
    host_key: identity::Keypair,
    config: &NetworkConfig,
    peers: SharedPeerList,
    cancel: CancellationToken,
) -> P2pResult<(Arc<Libp2pGossip>, Arc<Libp2pStreams>)> {
    let peer_id = PeerId::from(host_key.public());
    let behaviour = QuoranetBehaviour::new(&host_key, config.enable_mdns)
        .map_err(|e| P2pError::Transport(e.to_string()))?;

    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(host_key)
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .with_behaviour(|_| behaviour)
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .with_swarm_config(|c| {
            c.with_idle_connection_timeout(std::time::Duration::from_secs(60))
        })
        .build();

    let listen_addr: Multiaddr = config
        .listen_addr
        .parse()
        .map_err(|e| P2pError::Transport(format!("bad listen addr: {e}")))?;
    swarm
        .listen_on(listen_addr)
        .map_err(|e| P2pError::Transport(format!("listen failed: {e:?}")))?;

    for addr in &config.bootstrap_nodes {
        match addr.parse::<Multiaddr>() {
            Ok(addr) => {
                if let Err(e) = swarm.dial(addr.clone()) {
                    warn!(%addr, error = %e, "failed to dial bootstrap node");
                }
            }
            Err(e) => warn!(%addr, error = %e, "bad bootstrap address"),
        }
    }

    let mut control = swarm.behaviour().stream.new_control();
    let incoming = control
        .accept(StreamProtocol::new(PROTOCOL_BLOCK_PROPOSE))
        .map_err(|e| P2pError::Transport(format!("protocol registration failed: {e}")))?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);

    tokio::spawn(async move {
        let mut subscribers: HashMap<TopicHash, mpsc::Sender<GossipMessage>> = HashMap::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return };
                    match cmd {
                        Command::Subscribe { topic, reply } => {
                            let ident = IdentTopic::new(topic);
                            let res = match swarm.behaviour_mut().gossipsub.subscribe(&ident) {
                                Ok(_) => {
                                    let (tx, rx) = mpsc::channel(128);
                                    subscribers.insert(ident.hash(), tx);
                                    Ok(rx)
                                }
                                Err(e) => Err(P2pError::Subscribe(format!("{e:?}"))),
                            };
                            let _ = reply.send(res);
                        }
                        Command::Publish { topic, data, reply } => {
                            let res = swarm
                                .behaviour_mut()
                                .gossipsub
                                .publish(IdentTopic::new(topic), data)
                                .map(|_| ())
                                .map_err(|e| P2pError::Publish(e.to_string()));
                            let _ = reply.send(res);
                        }
                    }
                }

                event = swarm.select_next_some() => match event {
                    SwarmEvent::Behaviour(QuoranetBehaviourEvent::Gossipsub(
                        gossipsub::Event::Message { message, .. },
                    )) => {
                        // unsigned messages carry no origin; nothing to
                        // verify a vote against, so they are dropped here
                        let Some(source) = message.source else { continue };
                        if let Some(tx) = subscribers.get(&message.topic) {
                            if tx
                                .try_send(GossipMessage { from: source, data: message.data })
                                .is_err()
                            {
                                debug!(topic = %message.topic, "subscriber lagging, message dropped");
                            }
                        }
                    }
                    SwarmEvent::Behaviour(QuoranetBehaviourEvent::Mdns(
                        mdns::Event::Discovered(list),
                    )) => {
                        for (peer, addr) in list {
                            debug!(%peer, %addr, "mdns discovered peer");
                            swarm.behaviour_mut().gossipsub.add_explicit_peer(&peer);
                            let _ = swarm.dial(addr);
                        }
                    }
                    SwarmEvent::Behaviour(QuoranetBehaviourEvent::Mdns(
                        mdns::Event::Expired(list),
                    )) => {
                        for (peer, _) in list {
                            swarm.behaviour_mut().gossipsub.remove_explicit_peer(&peer);
                        }
                    }
                    SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                        info!(peer = %peer_id, "peer connected");
                        peers.add(peer_id);
                    }
                    SwarmEvent::ConnectionClosed { peer_id, num_established: 0, .. } => {
                        info!(peer = %peer_id, "peer disconnected");
                        peers.remove(&peer_id);
                    }
                    SwarmEvent::NewListenAddr { address, .. } => {
                        info!(%address, "listening");
                    }
                    _ => {}
                },
            }
        }
    });

    Ok((
        Arc::new(Libp2pGossip { peer_id, cmd_tx }),
        Arc::new(Libp2pStreams {
            control,
            incoming: tokio::sync::Mutex::new(incoming),
        }),
    ))
}

#[async_trait::async_trait]
impl Gossip for Libp2pGossip {
    type Topic = Libp2pTopic;
    type Subscription = Libp2pSubscription;

    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn subscribe(&self, topic: &str) -> P2pResult<(Libp2pTopic, Libp2pSubscription)> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                topic: topic.to_string(),
                reply,
            })
            .await
            .map_err(|_| P2pError::ChannelClosed)?;
        let sub_rx = rx.await.map_err(|_| P2pError::ChannelClosed)??;

        Ok((
            Libp2pTopic {
                topic: topic.to_string(),
                cmd_tx: self.cmd_tx.clone(),
            },
            Libp2pSubscription { rx: sub_rx },
        ))
    }
}

pub struct Libp2pTopic {
    topic: String,
    cmd_tx: mpsc::Sender<Command>,
}

#[async_trait::async_trait]
impl Topic for Libp2pTopic {
    async fn publish(&self, data: Vec<u8>) -> P2pResult<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Publish {
                topic: self.topic.clone(),
                data,
                reply,
            })
            .await
            .map_err(|_| P2pError::ChannelClosed)?;
        rx.await.map_err(|_| P2pError::ChannelClosed)?
    }
}

pub struct Libp2pSubscription {
    rx: mpsc::Receiver<GossipMessage>,
}

#[async_trait::async_trait]
impl Subscription for Libp2pSubscription {
    async fn next(&mut self) -> Option<GossipMessage> {
        self.rx.recv().await
    }
}

#[async_trait::async_trait]
impl StreamHost for Libp2pStreams {
    type Stream = libp2p::Stream;

    async fn open_stream(&self, peer: PeerId, protocol: &str) -> P2pResult<Self::Stream> {
        let proto = StreamProtocol::try_from_owned(protocol.to_string())
            .map_err(|e| P2pError::StreamOpen(e.to_string()))?;
        self.control
            .clone()
            .open_stream(peer, proto)
            .await
            .map_err(|e| P2pError::StreamOpen(e.to_string()))
    }

    async fn accept(&self) -> Option<(PeerId, Self::Stream)> {
        self.incoming.lock().await.next().await
    }
}
