//! Error types for QUORANET core

use thiserror::Error;

/// Main error type for core codec and domain operations.
///
/// The messages for [`CoreError::InvalidTxLength`] and
/// [`CoreError::InvalidSigLength`] are part of the decode contract and must
/// not change.
#[derive(Error, Debug)]
pub enum CoreError {
    // ============ Codec Errors ============
    #[error("not found")]
    NotFound,

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid transaction length")]
    InvalidTxLength,

    #[error("invalid signature length")]
    InvalidSigLength,

    #[error("invalid utf-8 string")]
    InvalidString,

    #[error("invalid ack status: {0}")]
    InvalidAckStatus(u8),

    // ============ Vote Contract Errors ============
    #[error("positive vote must commit to an app hash")]
    MissingAppHash,

    #[error("diverge vote requires an app hash")]
    DivergeWithoutAppHash,

    // ============ Crypto ============
    #[error(transparent)]
    Crypto(#[from] quoranet_crypto::CryptoError),
}
