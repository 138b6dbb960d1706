//! Error types for QUORANET p2p

use quoranet_core::Hash;
use thiserror::Error;

/// Errors surfaced by the transport layer and the stream protocol.
#[derive(Error, Debug)]
pub enum P2pError {
    #[error("unexpected height: wanted {wanted}, got {got}")]
    HeightMismatch { wanted: i64, got: i64 },

    #[error("unexpected block hash: wanted {wanted}, got {got}")]
    HashMismatch { wanted: Hash, got: Hash },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("stream open failed: {0}")]
    StreamOpen(String),

    #[error("peer declined the block pull")]
    Declined,

    #[error("operation timed out")]
    Timeout,

    #[error("peer id does not embed a public key")]
    OpaquePeerId,

    #[error("unsupported host key scheme")]
    UnsupportedKeyScheme,

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Core(#[from] quoranet_core::CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
