//! Key management for QUORANET
//!
//! Validator identities are secp256k1 or ed25519 keypairs. The scheme tag
//! travels with every public key and signature on the wire, so both sides
//! of the enum stay addressable as raw bytes.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{
    SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey, SECRET_KEY_LENGTH,
};
use k256::ecdsa::{SigningKey as Secp256k1SigningKey, VerifyingKey as Secp256k1VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::CryptoResult;

/// Length of an ed25519 public key in bytes.
pub const ED25519_PUBKEY_LEN: usize = 32;
/// Length of a compressed secp256k1 public key in bytes.
pub const SECP256K1_PUBKEY_LEN: usize = 33;

/// Key scheme tag. The discriminant is the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum KeyType {
    #[default]
    Secp256k1 = 0,
    Ed25519 = 1,
}

impl KeyType {
    /// Decode a wire tag.
    pub fn from_u8(tag: u8) -> CryptoResult<Self> {
        match tag {
            0 => Ok(KeyType::Secp256k1),
            1 => Ok(KeyType::Ed25519),
            other => Err(CryptoError::UnknownKeyType(other)),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Secp256k1 => write!(f, "secp256k1"),
            KeyType::Ed25519 => write!(f, "ed25519"),
        }
    }
}

impl FromStr for KeyType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secp256k1" => Ok(KeyType::Secp256k1),
            "ed25519" => Ok(KeyType::Ed25519),
            _ => Err(CryptoError::InvalidPublicKey),
        }
    }
}

/// A private signing key under one of the supported schemes.
#[derive(Clone)]
pub enum PrivateKey {
    Secp256k1(Secp256k1SigningKey),
    Ed25519(Ed25519SigningKey),
}

impl PrivateKey {
    /// Generate a new random key for the given scheme.
    pub fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Secp256k1 => PrivateKey::Secp256k1(Secp256k1SigningKey::random(&mut OsRng)),
            KeyType::Ed25519 => PrivateKey::Ed25519(Ed25519SigningKey::generate(&mut OsRng)),
        }
    }

    /// Reconstruct a key from raw secret bytes.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> CryptoResult<Self> {
        match key_type {
            KeyType::Secp256k1 => Secp256k1SigningKey::from_slice(bytes)
                .map(PrivateKey::Secp256k1)
                .map_err(|_| CryptoError::InvalidPrivateKey),
            KeyType::Ed25519 => {
                if bytes.len() != SECRET_KEY_LENGTH {
                    return Err(CryptoError::InvalidPrivateKey);
                }
                let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
                seed.copy_from_slice(bytes);
                Ok(PrivateKey::Ed25519(Ed25519SigningKey::from_bytes(&seed)))
            }
        }
    }

    /// The scheme this key belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Secp256k1(_) => KeyType::Secp256k1,
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Secp256k1(sk) => PublicKey::Secp256k1(*sk.verifying_key()),
            PrivateKey::Ed25519(sk) => PublicKey::Ed25519(sk.verifying_key()),
        }
    }

    /// Raw secret bytes (zeroized on drop; handle with care).
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            PrivateKey::Secp256k1(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
            PrivateKey::Ed25519(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.key_type())
    }
}

/// A public key under one of the supported schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(Secp256k1VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    /// Reconstruct a public key from its wire bytes.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> CryptoResult<Self> {
        match key_type {
            KeyType::Secp256k1 => Secp256k1VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::Secp256k1)
                .map_err(|_| CryptoError::InvalidPublicKey),
            KeyType::Ed25519 => {
                let raw: [u8; ED25519_PUBKEY_LEN] =
                    bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
                Ed25519VerifyingKey::from_bytes(&raw)
                    .map(PublicKey::Ed25519)
                    .map_err(|_| CryptoError::InvalidPublicKey)
            }
        }
    }

    /// The scheme this key belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
            PublicKey::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// Wire bytes: 33-byte compressed SEC1 for secp256k1, 32 bytes for ed25519.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Secp256k1(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::Ed25519(vk) => vk.to_bytes().to_vec(),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type(), self.to_hex())
    }
}

/// A private key together with its cached public half.
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn new(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Generate a new random keypair for the given scheme.
    pub fn generate(key_type: KeyType) -> Self {
        Self::new(PrivateKey::generate(key_type))
    }

    pub fn from_secret_bytes(key_type: KeyType, bytes: &[u8]) -> CryptoResult<Self> {
        Ok(Self::new(PrivateKey::from_bytes(key_type, bytes)?))
    }

    pub fn key_type(&self) -> KeyType {
        self.private.key_type()
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }
}
