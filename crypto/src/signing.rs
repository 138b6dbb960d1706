//! Digital signature operations
//!
//! Free functions dispatching on the key scheme. Raw signature bytes are
//! 64 bytes for both schemes (fixed-size ECDSA, ed25519).

// ed25519-dalek and k256 both implement the `signature` crate traits; one
// import covers both schemes.
use k256::ecdsa::signature::{Signer as _, Verifier as _};

use crate::error::CryptoError;
use crate::keys::{KeyType, PrivateKey, PublicKey};
use crate::CryptoResult;

/// Sign a message, returning the raw signature bytes.
///
/// secp256k1 signs the SHA-256 digest of the message (ECDSA); ed25519 signs
/// the message directly.
pub fn sign(key: &PrivateKey, message: &[u8]) -> Vec<u8> {
    match key {
        PrivateKey::Secp256k1(sk) => {
            let sig: k256::ecdsa::Signature = sk.sign(message);
            sig.to_bytes().to_vec()
        }
        PrivateKey::Ed25519(sk) => sk.sign(message).to_bytes().to_vec(),
    }
}

/// Verify raw signature bytes over a message.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
    match public_key {
        PublicKey::Secp256k1(vk) => {
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::VerificationFailed)
        }
        PublicKey::Ed25519(vk) => {
            let sig = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::VerificationFailed)
        }
    }
}

/// Verify a signature whose public key arrived as wire bytes plus a tag.
pub fn verify_signature(
    pub_key: &[u8],
    key_type: KeyType,
    message: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let pk = PublicKey::from_bytes(key_type, pub_key)?;
    verify(&pk, message, signature)
}
