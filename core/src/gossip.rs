//! Gossip wire records
//!
//! Compact messages exchanged outside of full blocks: the block-proposal
//! advertisement that gates a pull of the block contents, the consensus
//! reset order, and the discovery request/response pair used to locate the
//! best height on the network.

use std::fmt;

use crate::codec::{get_i64, get_u32, put_i64, put_u32, take};
use crate::error::CoreError;
use crate::types::Hash;
use crate::CoreResult;

/// Upper bound on an advertised leader signature.
const MAX_LEADER_SIG_LEN: i64 = 1000;

/// Advertisement of a proposed block: identity plus the leader signature.
///
/// Wire form: height i64 || hash || prev_hash || stamp i64 || sig_len i64 ||
/// leader_sig. Decoding rejects signature lengths above 1000 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockProp {
    pub height: i64,
    pub hash: Hash,
    pub prev_hash: Hash,
    /// Proposal timestamp, epoch milliseconds.
    pub stamp: i64,
    pub leader_sig: Vec<u8>,
}

impl BlockProp {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 2 * 32 + 8 + 8 + self.leader_sig.len());
        put_i64(&mut out, self.height);
        out.extend_from_slice(self.hash.as_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        put_i64(&mut out, self.stamp);
        put_i64(&mut out, self.leader_sig.len() as i64);
        out.extend_from_slice(&self.leader_sig);
        out
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let height = get_i64(&mut cur)?;
        let hash = Hash::read_from(&mut cur)?;
        let prev_hash = Hash::read_from(&mut cur)?;
        let stamp = get_i64(&mut cur)?;
        let sig_len = get_i64(&mut cur)?;
        if !(0..=MAX_LEADER_SIG_LEN).contains(&sig_len) {
            return Err(CoreError::InvalidSigLength);
        }
        let leader_sig = take(&mut cur, sig_len as usize)?.to_vec();
        Ok(BlockProp {
            height,
            hash,
            prev_hash,
            stamp,
            leader_sig,
        })
    }
}

impl fmt::Display for BlockProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prop{{height:{} hash:{} prevHash:{}}}",
            self.height, self.hash, self.prev_hash
        )
    }
}

/// Order to roll consensus state back to a height, listing the txns to
/// return to the mempool. Meaningful only when it originates from the
/// leader; the receiver passes the sender identity on for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsensusReset {
    pub to_height: i64,
    pub tx_ids: Vec<Hash>,
}

impl ConsensusReset {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 4 + 32 * self.tx_ids.len());
        put_i64(&mut out, self.to_height);
        put_u32(&mut out, self.tx_ids.len() as u32);
        for id in &self.tx_ids {
            out.extend_from_slice(id.as_bytes());
        }
        out
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let to_height = get_i64(&mut cur)?;
        let count = get_u32(&mut cur)?;
        let mut tx_ids = Vec::new();
        for _ in 0..count {
            tx_ids.push(Hash::read_from(&mut cur)?);
        }
        Ok(ConsensusReset { to_height, tx_ids })
    }
}

impl fmt::Display for ConsensusReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reset{{to:{} txs:{}}}",
            self.to_height,
            self.tx_ids.len()
        )
    }
}

/// Ask the network for its best height. Empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryRequest;

impl DiscoveryRequest {
    pub fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Answer to a [`DiscoveryRequest`] with the responder's best height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryResponse {
    pub best_height: i64,
}

impl DiscoveryResponse {
    pub fn encode(&self) -> Vec<u8> {
        self.best_height.to_le_bytes().to_vec()
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let best_height = get_i64(&mut cur)?;
        Ok(DiscoveryResponse { best_height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_prop_roundtrip() {
        let prop = BlockProp {
            height: 12,
            hash: Hash::digest(b"blk"),
            prev_hash: Hash::digest(b"prev"),
            stamp: 1_729_890_593_000,
            leader_sig: vec![7u8; 64],
        };
        let decoded = BlockProp::decode(&prop.encode()).unwrap();
        assert_eq!(prop, decoded);
    }

    #[test]
    fn test_block_prop_rejects_oversized_sig() {
        let prop = BlockProp {
            height: 12,
            hash: Hash::digest(b"blk"),
            prev_hash: Hash::digest(b"prev"),
            stamp: 0,
            leader_sig: vec![0u8; 1001],
        };
        let err = BlockProp::decode(&prop.encode()).unwrap_err();
        assert!(err.to_string().contains("invalid signature length"));
    }

    #[test]
    fn test_block_prop_rejects_truncation() {
        let prop = BlockProp {
            height: 12,
            hash: Hash::digest(b"blk"),
            prev_hash: Hash::digest(b"prev"),
            stamp: 0,
            leader_sig: vec![7u8; 64],
        };
        let encoded = prop.encode();
        assert!(BlockProp::decode(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_block_prop_display() {
        let prop = BlockProp {
            height: 5,
            ..Default::default()
        };
        assert!(prop.to_string().starts_with("prop{height:5 hash:"));
    }

    #[test]
    fn test_consensus_reset_roundtrip() {
        let reset = ConsensusReset {
            to_height: 41,
            tx_ids: vec![Hash::digest(b"a"), Hash::digest(b"b")],
        };
        let decoded = ConsensusReset::decode(&reset.encode()).unwrap();
        assert_eq!(reset, decoded);

        let empty = ConsensusReset::default();
        assert_eq!(ConsensusReset::decode(&empty.encode()).unwrap(), empty);
    }

    #[test]
    fn test_discovery_response_roundtrip() {
        let resp = DiscoveryResponse { best_height: 99 };
        assert_eq!(DiscoveryResponse::decode(&resp.encode()).unwrap(), resp);
    }

    #[test]
    fn test_discovery_request_is_empty() {
        assert!(DiscoveryRequest.encode().is_empty());
    }
}
