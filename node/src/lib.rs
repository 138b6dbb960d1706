//! QUORANET Node
//!
//! The orchestrator that ties identity, the consensus engine, the block
//! index, and the transport together: it owns the channels the engine's
//! callbacks feed and the background tasks that gossip them.

mod node;
mod sentry;

pub use node::{Node, NodeBuilder};
pub use sentry::{GenesisBlockStore, SentryEngine};
