//! Gossip loops
//!
//! One publish task and one receive task per topic. Publish tasks drain
//! their channel and terminate on a publish failure (the orchestrator may
//! restart them; the consensus engine tolerates a lost vote by retrying).
//! Receive tasks never trust peer input: malformed messages are logged and
//! dropped, senders whose public key cannot be derived are dropped
//! silently, and role filters keep followers from aggregating
//! leader-bound traffic.
//!
//! ACK and discovery deliveries are spawned fire-and-forget so a slow
//! engine cannot stall the receive loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quoranet_core::{
    AckRes, BlockStore, ConsensusReset, DiscoveryRequest, DiscoveryResponse, Engine, Role,
};

use crate::identity::pubkey_from_peer_id;
use crate::transport::{Gossip, GossipMessage, Subscription, Topic};
use crate::{P2pResult, TOPIC_ACKS, TOPIC_DISC_REQ, TOPIC_DISC_RESP, TOPIC_RESET};

/// Validator votes travel from every node to the leader.
///
/// Publish: drain `ack_rx` onto the topic. Receive: leaders decode each
/// non-self vote, recover the sender key from the envelope, and hand the
/// vote to the engine off the receive path.
pub async fn start_ack_gossip<G: Gossip>(
    cancel: CancellationToken,
    gossip: Arc<G>,
    ce: Arc<dyn Engine>,
    mut ack_rx: mpsc::Receiver<AckRes>,
) -> P2pResult<Vec<JoinHandle<()>>> {
    let (topic, mut sub) = gossip.subscribe(TOPIC_ACKS).await?;
    let me = gossip.local_peer_id();

    let pub_cancel = cancel.clone();
    let publish = tokio::spawn(async move {
        loop {
            let ack = tokio::select! {
                _ = pub_cancel.cancelled() => return,
                ack = ack_rx.recv() => match ack {
                    Some(ack) => ack,
                    None => return,
                },
            };
            debug!(%ack, "publishing ACK");
            if let Err(e) = topic.publish(ack.encode()).await {
                warn!(%ack, error = %e, "ACK publish failure");
                return;
            }
        }
    });

    let receive = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => return,
                msg = sub.next() => match msg {
                    Some(msg) => msg,
                    None => return,
                },
            };

            // only the leader aggregates; everyone else is just relaying
            if ce.role() != Role::Leader {
                continue;
            }
            if msg.from == me {
                continue;
            }

            let ack = match AckRes::decode(&msg.data) {
                Ok(ack) => ack,
                Err(e) => {
                    info!(error = %e, "failed to decode ACK msg");
                    continue;
                }
            };
            let Some(pub_key) = sender_pubkey(&msg) else {
                continue;
            };

            debug!(from = %msg.from, %ack, "received ACK msg");
            let ce = ce.clone();
            tokio::spawn(async move {
                ce.notify_ack(pub_key, ack).await;
            });
        }
    });

    Ok(vec![publish, receive])
}

/// Discovery requests ask the network for its best height. Any node that
/// hears a non-self request answers from its block index via `resp_tx`.
pub async fn start_discovery_request_gossip<G: Gossip>(
    cancel: CancellationToken,
    gossip: Arc<G>,
    bki: Arc<dyn BlockStore>,
    mut req_rx: mpsc::Receiver<DiscoveryRequest>,
    resp_tx: mpsc::Sender<DiscoveryResponse>,
) -> P2pResult<Vec<JoinHandle<()>>> {
    let (topic, mut sub) = gossip.subscribe(TOPIC_DISC_REQ).await?;
    let me = gossip.local_peer_id();

    info!("starting discovery request gossip");

    let pub_cancel = cancel.clone();
    let publish = tokio::spawn(async move {
        loop {
            let req = tokio::select! {
                _ = pub_cancel.cancelled() => return,
                req = req_rx.recv() => match req {
                    Some(req) => req,
                    None => return,
                },
            };
            debug!("publishing discovery request");
            if let Err(e) = topic.publish(req.encode()).await {
                warn!(error = %e, "discovery request publish failure");
                return;
            }
        }
    });

    let receive = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => return,
                msg = sub.next() => match msg {
                    Some(msg) => msg,
                    None => return,
                },
            };
            if msg.from == me {
                continue;
            }

            info!(from = %msg.from, "received discovery request");

            let (best_height, _, _) = bki.best();
            if resp_tx
                .send(DiscoveryResponse { best_height })
                .await
                .is_err()
            {
                return;
            }
            info!(height = best_height, "responded to discovery request");
        }
    });

    Ok(vec![publish, receive])
}

/// Discovery responses carry a peer's best height back to the leader.
pub async fn start_discovery_response_gossip<G: Gossip>(
    cancel: CancellationToken,
    gossip: Arc<G>,
    ce: Arc<dyn Engine>,
    mut resp_rx: mpsc::Receiver<DiscoveryResponse>,
) -> P2pResult<Vec<JoinHandle<()>>> {
    let (topic, mut sub) = gossip.subscribe(TOPIC_DISC_RESP).await?;
    let me = gossip.local_peer_id();

    info!("starting discovery response gossip");

    let pub_cancel = cancel.clone();
    let publish = tokio::spawn(async move {
        loop {
            let resp = tokio::select! {
                _ = pub_cancel.cancelled() => return,
                resp = resp_rx.recv() => match resp {
                    Some(resp) => resp,
                    None => return,
                },
            };
            debug!(height = resp.best_height, "publishing discovery response");
            if let Err(e) = topic.publish(resp.encode()).await {
                warn!(height = resp.best_height, error = %e, "discovery response publish failure");
                return;
            }
        }
    });

    let receive = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => return,
                msg = sub.next() => match msg {
                    Some(msg) => msg,
                    None => return,
                },
            };
            if ce.role() != Role::Leader {
                continue;
            }
            if msg.from == me {
                continue;
            }

            let resp = match DiscoveryResponse::decode(&msg.data) {
                Ok(resp) => resp,
                Err(e) => {
                    info!(error = %e, "failed to decode discovery msg");
                    continue;
                }
            };
            let Some(pub_key) = sender_pubkey(&msg) else {
                continue;
            };

            info!(from = %msg.from, height = resp.best_height, "received discovery response");
            let ce = ce.clone();
            tokio::spawn(async move {
                ce.notify_discovery_message(pub_key, resp.best_height).await;
            });
        }
    });

    Ok(vec![publish, receive])
}

/// Consensus resets roll validators back to a height. Only the leader may
/// order one; the engine authorizes the sender key we recover here.
pub async fn start_reset_gossip<G: Gossip>(
    cancel: CancellationToken,
    gossip: Arc<G>,
    ce: Arc<dyn Engine>,
    mut reset_rx: mpsc::Receiver<ConsensusReset>,
) -> P2pResult<Vec<JoinHandle<()>>> {
    let (topic, mut sub) = gossip.subscribe(TOPIC_RESET).await?;
    let me = gossip.local_peer_id();

    let pub_cancel = cancel.clone();
    let publish = tokio::spawn(async move {
        loop {
            let reset = tokio::select! {
                _ = pub_cancel.cancelled() => return,
                reset = reset_rx.recv() => match reset {
                    Some(reset) => reset,
                    None => return,
                },
            };
            debug!(%reset, "publishing consensus reset");
            if let Err(e) = topic.publish(reset.encode()).await {
                warn!(%reset, error = %e, "consensus reset publish failure");
                return;
            }
        }
    });

    let receive = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => return,
                msg = sub.next() => match msg {
                    Some(msg) => msg,
                    None => return,
                },
            };
            if msg.from == me {
                continue;
            }

            let reset = match ConsensusReset::decode(&msg.data) {
                Ok(reset) => reset,
                Err(e) => {
                    info!(error = %e, "unable to decode reset msg");
                    continue;
                }
            };
            let Some(pub_key) = sender_pubkey(&msg) else {
                continue;
            };

            info!(from = %msg.from, %reset, "received consensus reset msg");
            ce.notify_reset_state(reset.to_height, reset.tx_ids, pub_key)
                .await;
        }
    });

    Ok(vec![publish, receive])
}

/// Recover the sender's public key bytes from the message envelope;
/// unauthenticated senders are dropped without a trace at info level.
fn sender_pubkey(msg: &GossipMessage) -> Option<Vec<u8>> {
    match pubkey_from_peer_id(&msg.from) {
        Ok(pk) => Some(pk.to_bytes()),
        Err(e) => {
            info!(from = %msg.from, error = %e, "failed to extract pubkey from peer id");
            None
        }
    }
}
