//! QUORANET Core Library
//!
//! Domain types, the binary wire codec, and the consensus-engine interface
//! for the QUORANET block-gossip core. This crate provides the foundation
//! for the p2p and node components.

pub mod block;
pub mod config;
pub mod error;
pub mod gossip;
pub mod traits;
pub mod tx;
pub mod types;
pub mod vote;

pub(crate) mod codec;

pub use block::{get_raw_block_tx, merkle_root, Block, BlockHeader, BLOCK_VERSION};
pub use config::{ConsensusConfig, NetworkConfig, NodeConfig};
pub use error::CoreError;
pub use gossip::{BlockProp, ConsensusReset, DiscoveryRequest, DiscoveryResponse};
pub use traits::{BlockStore, Engine, Role};
pub use tx::{Transaction, TxBody};
pub use types::{Hash, Signature, Timestamp, HASH_LEN};
pub use vote::{sign_vote, AckRes, AckStatus, CommitInfo, VoteInfo};

// The key scheme tag travels through every signature; re-exported so
// dependents do not need a direct quoranet-crypto dependency for it.
pub use quoranet_crypto::KeyType;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
