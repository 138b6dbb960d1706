//! Test doubles shared across the p2p test modules.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use quoranet_core::{AckRes, Block, BlockStore, Engine, Hash, Role};

/// Everything the mock engine was asked to do, in call order.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    AcceptProposal {
        height: i64,
        hash: Hash,
    },
    BlockProposal(Block),
    Ack {
        sender: Vec<u8>,
        ack: AckRes,
    },
    Discovery {
        sender: Vec<u8>,
        best_height: i64,
    },
    Reset {
        to_height: i64,
        tx_ids: Vec<Hash>,
        sender: Vec<u8>,
    },
}

/// Consensus engine double: fixed role, fixed accept answer, records calls.
pub(crate) struct MockEngine {
    role: Role,
    accept: bool,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl MockEngine {
    pub(crate) fn new(
        role: Role,
        accept: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
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
impl Engine for MockEngine {
    fn role(&self) -> Role {
        self.role
    }

    async fn accept_proposal(
        &self,
        height: i64,
        blk_hash: Hash,
        _prev_hash: Hash,
        _leader_sig: &[u8],
        _stamp: i64,
    ) -> bool {
        let _ = self.events.send(EngineEvent::AcceptProposal {
            height,
            hash: blk_hash,
        });
        self.accept
    }

    async fn notify_block_proposal(&self, block: Block) {
        let _ = self.events.send(EngineEvent::BlockProposal(block));
    }

    async fn notify_ack(&self, sender_pub_key: Vec<u8>, ack: AckRes) {
        let _ = self.events.send(EngineEvent::Ack {
            sender: sender_pub_key,
            ack,
        });
    }

    async fn notify_discovery_message(&self, sender_pub_key: Vec<u8>, best_height: i64) {
        let _ = self.events.send(EngineEvent::Discovery {
            sender: sender_pub_key,
            best_height,
        });
    }

    async fn notify_reset_state(&self, to_height: i64, tx_ids: Vec<Hash>, sender_pub_key: Vec<u8>) {
        let _ = self.events.send(EngineEvent::Reset {
            to_height,
            tx_ids,
            sender: sender_pub_key,
        });
    }
}

/// Block index double reporting a fixed best height.
pub(crate) struct FixedBlockStore(pub(crate) i64);

impl BlockStore for FixedBlockStore {
    fn best(&self) -> (i64, Hash, Hash) {
        (self.0, Hash::ZERO, Hash::ZERO)
    }
}

/// A connected pair of byte streams for protocol tests.
pub(crate) fn pipe() -> (Compat<DuplexStream>, Compat<DuplexStream>) {
    let (a, b) = tokio::io::duplex(1 << 20);
    (a.compat(), b.compat())
}
