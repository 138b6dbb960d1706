//! Collaborator interfaces
//!
//! The gossip core routes and validates messages; deciding what to do with
//! them is the consensus engine's job. The engine is handed in once at
//! construction as a capability object and called through [`Engine`]; it
//! never holds a reference back into the core.

use async_trait::async_trait;

use crate::types::Hash;
use crate::vote::AckRes;
use crate::Block;

/// Consensus role as reported by the engine. Controls which topic messages
/// a node acts on: only leaders aggregate votes and discovery responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Validator,
    Sentry,
}

/// The consensus engine as seen from the gossip core.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Current role of this node.
    fn role(&self) -> Role;

    /// Whether the engine wants the contents of an announced proposal.
    async fn accept_proposal(
        &self,
        height: i64,
        blk_hash: Hash,
        prev_hash: Hash,
        leader_sig: &[u8],
        stamp: i64,
    ) -> bool;

    /// Hand over a pulled block whose announcement was accepted.
    async fn notify_block_proposal(&self, block: Block);

    /// Deliver a validator vote (leader only). May block on internal
    /// aggregation; callers dispatch it off the receive path.
    async fn notify_ack(&self, sender_pub_key: Vec<u8>, ack: AckRes);

    /// Deliver a peer's best height (leader only).
    async fn notify_discovery_message(&self, sender_pub_key: Vec<u8>, best_height: i64);

    /// Deliver a consensus reset order. The engine authorizes the sender.
    async fn notify_reset_state(&self, to_height: i64, tx_ids: Vec<Hash>, sender_pub_key: Vec<u8>);
}

/// Read access to the local block index (`best height`, block hash, app
/// hash). Backed by the storage layer, which is outside the gossip core.
pub trait BlockStore: Send + Sync {
    fn best(&self) -> (i64, Hash, Hash);
}
