//! QUORANET Cryptography Module
//!
//! Key schemes, signing, and verification for the QUORANET node.
//! Two schemes are supported: secp256k1 (ECDSA) and ed25519. Everything
//! above this crate addresses keys as raw bytes plus a [`KeyType`] tag.

pub mod keys;
pub mod signing;

mod error;

pub use error::CryptoError;
pub use keys::{KeyPair, KeyType, PrivateKey, PublicKey};
pub use signing::{sign, verify, verify_signature};

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
