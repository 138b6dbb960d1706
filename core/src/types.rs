//! Core types for QUORANET
//!
//! Defines the fundamental values that cross the wire: the 32-byte hash,
//! millisecond timestamps, and the tagged signature record.

use std::fmt;

use sha2::{Digest as _, Sha256};

use crate::codec::{get_bytes, get_u8, put_bytes, take};
use crate::error::CoreError;
use crate::{CoreResult, KeyType};

/// Length of a [`Hash`] in bytes.
pub const HASH_LEN: usize = 32;

/// 32-byte content hash. The zero value means "none" in optional positions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Hash::ZERO
    }

    /// The canonical digest: SHA-256 over arbitrary input.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let raw: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(raw))
    }

    pub(crate) fn read_from(input: &mut &[u8]) -> CoreResult<Self> {
        let raw = take(input, HASH_LEN)?;
        Ok(Hash(raw.try_into().expect("split to HASH_LEN bytes")))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Millisecond-precision epoch instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(ms)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A signature together with the signer's public key and scheme tag.
///
/// Wire form: `u32le len(data) || data || u32le len(pub_key) || pub_key ||
/// key_type u8`. Decoding fails if either length outruns the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub data: Vec<u8>,
    pub pub_key: Vec<u8>,
    pub key_type: KeyType,
}

impl Signature {
    pub fn new(data: Vec<u8>, pub_key: Vec<u8>, key_type: KeyType) -> Self {
        Self {
            data,
            pub_key,
            key_type,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        put_bytes(out, &self.data);
        put_bytes(out, &self.pub_key);
        out.push(self.key_type as u8);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.data.len() + 4 + self.pub_key.len() + 1);
        self.write_to(&mut out);
        out
    }

    pub fn read_from(input: &mut &[u8]) -> CoreResult<Self> {
        let data = get_bytes(input)?;
        let pub_key = get_bytes(input)?;
        let tag = get_u8(input)?;
        let key_type = KeyType::from_u8(tag).map_err(CoreError::Crypto)?;
        Ok(Signature {
            data,
            pub_key,
            key_type,
        })
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        Self::read_from(&mut cur)
    }
}
