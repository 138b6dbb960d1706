//! Sentry mode
//!
//! A sentry relays gossip without aggregating votes or pulling proposal
//! contents. It is the engine the standalone binary runs with; a real
//! validator deployment injects its consensus engine instead.

use async_trait::async_trait;
use tracing::debug;

use quoranet_core::{AckRes, Block, BlockStore, Engine, Hash, Role};

/// Relay-only consensus engine.
pub struct SentryEngine;

#[async_trait]
impl Engine for SentryEngine {
    fn role(&self) -> Role {
        Role::Sentry
    }

    async fn accept_proposal(
        &self,
        height: i64,
        blk_hash: Hash,
        _prev_hash: Hash,
        _leader_sig: &[u8],
        _stamp: i64,
    ) -> bool {
        debug!(height, hash = %blk_hash, "sentry declining proposal content");
        false
    }

    async fn notify_block_proposal(&self, block: Block) {
        debug!(height = block.header.height, "sentry ignoring block proposal");
    }

    async fn notify_ack(&self, _sender_pub_key: Vec<u8>, ack: AckRes) {
        debug!(%ack, "sentry ignoring ACK");
    }

    async fn notify_discovery_message(&self, _sender_pub_key: Vec<u8>, best_height: i64) {
        debug!(best_height, "sentry ignoring discovery message");
    }

    async fn notify_reset_state(
        &self,
        to_height: i64,
        _tx_ids: Vec<Hash>,
        _sender_pub_key: Vec<u8>,
    ) {
        debug!(to_height, "sentry ignoring consensus reset");
    }
}

/// Block index of a node that has nothing yet.
pub struct GenesisBlockStore;

impl BlockStore for GenesisBlockStore {
    fn best(&self) -> (i64, Hash, Hash) {
        (0, Hash::ZERO, Hash::ZERO)
    }
}
