//! Transactions
//!
//! The execution engine treats transaction payloads as opaque; the core only
//! needs a self-delimited binary form so blocks can carry and index them.

use crate::codec::{get_bytes, get_i64, get_string, put_bytes, put_i64, put_string};
use crate::types::{Hash, Signature};
use crate::CoreResult;

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxBody {
    /// Human-readable description shown to the signer.
    pub description: String,
    /// Opaque payload interpreted by the execution engine.
    pub payload: Vec<u8>,
    pub fee: i64,
    pub nonce: u64,
}

/// A transaction: body, sender identifier, and the sender's signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub body: TxBody,
    pub sender: Vec<u8>,
    pub signature: Signature,
}

impl Transaction {
    /// Self-delimited binary form; every variable field is length-prefixed.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_string(&mut out, &self.body.description);
        put_bytes(&mut out, &self.body.payload);
        put_i64(&mut out, self.body.fee);
        put_i64(&mut out, self.body.nonce as i64);
        put_bytes(&mut out, &self.sender);
        self.signature.write_to(&mut out);
        out
    }

    pub fn read_from(input: &mut &[u8]) -> CoreResult<Self> {
        let description = get_string(input)?;
        let payload = get_bytes(input)?;
        let fee = get_i64(input)?;
        let nonce = get_i64(input)? as u64;
        let sender = get_bytes(input)?;
        let signature = Signature::read_from(input)?;
        Ok(Transaction {
            body: TxBody {
                description,
                payload,
                fee,
                nonce,
            },
            sender,
            signature,
        })
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        Self::read_from(&mut cur)
    }

    /// Transaction id: the canonical digest of the encoded form.
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.encode())
    }
}
