//! Error types for QUORANET crypto

use thiserror::Error;

/// Errors produced by key handling and signature checks.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("unknown key type: {0}")]
    UnknownKeyType(u8),
}
