//! Blocks, headers, and the Merkle commitment
//!
//! The header encoding is fixed-size with no length prefixes; the block
//! encoding appends the leader signature and each transaction behind u32-le
//! length prefixes. Both encodings are normative wire formats.

use crate::codec::{get_i64, get_u16, get_u32, put_bytes, put_i64, put_u16, put_u32, take};
use crate::error::CoreError;
use crate::tx::Transaction;
use crate::types::{Hash, Timestamp, HASH_LEN};
use crate::CoreResult;
use quoranet_crypto::{sign, verify, PrivateKey, PublicKey};

/// Current block header version.
pub const BLOCK_VERSION: u16 = 1;

/// Encoded size of a [`BlockHeader`].
const HEADER_LEN: usize = 2 + 8 + 4 + 3 * HASH_LEN + 8 + HASH_LEN;

/// Any u32 length at or above this is rejected by the block decoder.
const MAX_WIRE_LEN: u32 = 1 << 31;

/// Block header. `merkle_root` commits to the ordered transaction ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub version: u16,
    pub height: i64,
    pub num_txns: u32,
    pub prev_hash: Hash,
    pub prev_app_hash: Hash,
    pub validator_set_hash: Hash,
    pub timestamp: Timestamp,
    pub merkle_root: Hash,
}

impl BlockHeader {
    /// Fixed-size encoding: version u16 || height i64 || num_txns u32 ||
    /// prev_hash || prev_app_hash || validator_set_hash || timestamp
    /// unix-millis i64 || merkle_root.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        put_u16(&mut out, self.version);
        put_i64(&mut out, self.height);
        put_u32(&mut out, self.num_txns);
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.prev_app_hash.as_bytes());
        out.extend_from_slice(self.validator_set_hash.as_bytes());
        put_i64(&mut out, self.timestamp.as_millis());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out
    }

    pub fn read_from(input: &mut &[u8]) -> CoreResult<Self> {
        let version = get_u16(input)?;
        let height = get_i64(input)?;
        let num_txns = get_u32(input)?;
        let prev_hash = Hash::read_from(input)?;
        let prev_app_hash = Hash::read_from(input)?;
        let validator_set_hash = Hash::read_from(input)?;
        let timestamp = Timestamp::from_millis(get_i64(input)?);
        let merkle_root = Hash::read_from(input)?;
        Ok(BlockHeader {
            version,
            height,
            num_txns,
            prev_hash,
            prev_app_hash,
            validator_set_hash,
            timestamp,
            merkle_root,
        })
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        Self::read_from(&mut cur)
    }

    /// Block id: the canonical digest of the encoded header.
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.encode())
    }
}

/// A block: header, ordered transactions, and the leader's signature over
/// the header digest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub txns: Vec<Transaction>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Build an unsigned block, committing to the ordered transaction ids.
    pub fn new(
        height: i64,
        prev_hash: Hash,
        prev_app_hash: Hash,
        validator_set_hash: Hash,
        timestamp: Timestamp,
        txns: Vec<Transaction>,
    ) -> Self {
        let tx_ids: Vec<Hash> = txns.iter().map(Transaction::hash).collect();
        let header = BlockHeader {
            version: BLOCK_VERSION,
            height,
            num_txns: txns.len() as u32,
            prev_hash,
            prev_app_hash,
            validator_set_hash,
            timestamp,
            merkle_root: merkle_root(&tx_ids),
        };
        Block {
            header,
            txns,
            signature: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Sign the header digest as leader.
    pub fn sign(&mut self, key: &PrivateKey) {
        self.signature = sign(key, self.hash().as_bytes());
    }

    /// Check the leader signature against the given public key.
    pub fn verify_signature(&self, public_key: &PublicKey) -> bool {
        verify(public_key, self.hash().as_bytes(), &self.signature).is_ok()
    }

    /// Header || u32le sig len || sig || per-txn u32le len || txn bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.header.encode();
        put_bytes(&mut out, &self.signature);
        for tx in &self.txns {
            put_bytes(&mut out, &tx.encode());
        }
        out
    }

    /// Decode a block, rejecting any length at or above 2^31 and any
    /// truncation.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let header = BlockHeader::read_from(&mut cur)?;

        let sig_len = get_u32(&mut cur)?;
        if sig_len >= MAX_WIRE_LEN {
            return Err(CoreError::InvalidSigLength);
        }
        let signature = take(&mut cur, sig_len as usize)?.to_vec();

        let mut txns = Vec::new();
        for _ in 0..header.num_txns {
            let tx_len = get_u32(&mut cur)?;
            if tx_len >= MAX_WIRE_LEN {
                return Err(CoreError::InvalidTxLength);
            }
            let raw = take(&mut cur, tx_len as usize)?;
            txns.push(Transaction::decode(raw)?);
        }

        Ok(Block {
            header,
            txns,
            signature,
        })
    }
}

/// Return the i-th raw transaction of an encoded block by reference.
///
/// Walks the length-prefixed transaction section without allocating;
/// [`CoreError::NotFound`] past the end, [`CoreError::InvalidTxLength`] when
/// a length is at or above 2^31 or extends past the buffer.
pub fn get_raw_block_tx(raw: &[u8], idx: u32) -> CoreResult<&[u8]> {
    let mut cur = raw;
    let header = BlockHeader::read_from(&mut cur)?;
    if idx >= header.num_txns {
        return Err(CoreError::NotFound);
    }

    let sig_len = get_u32(&mut cur)?;
    if sig_len >= MAX_WIRE_LEN {
        return Err(CoreError::InvalidSigLength);
    }
    take(&mut cur, sig_len as usize)?;

    for i in 0..=idx {
        let tx_len = get_u32(&mut cur)?;
        if tx_len >= MAX_WIRE_LEN || tx_len as usize > cur.len() {
            return Err(CoreError::InvalidTxLength);
        }
        let raw_tx = take(&mut cur, tx_len as usize)?;
        if i == idx {
            return Ok(raw_tx);
        }
    }
    Err(CoreError::NotFound)
}

/// Merkle root over ordered leaves.
///
/// Empty input yields the zero hash and a single leaf is its own root. At
/// each level adjacent pairs are concatenated and digested; an odd trailing
/// leaf is paired with itself. The input slice is never mutated.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    let mut buf = [0u8; 2 * HASH_LEN];

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            buf[..HASH_LEN].copy_from_slice(pair[0].as_bytes());
            buf[HASH_LEN..].copy_from_slice(right.as_bytes());
            next.push(Hash::digest(&buf));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::put_u32 as put_u32_raw;
    use crate::tx::TxBody;
    use crate::types::Signature;
    use quoranet_crypto::{KeyPair, KeyType};

    fn new_tx(nonce: u64, sender: &str, payload: &str) -> Transaction {
        Transaction {
            body: TxBody {
                description: "test".to_string(),
                payload: payload.as_bytes().to_vec(),
                fee: 0,
                nonce,
            },
            sender: sender.as_bytes().to_vec(),
            signature: Signature::default(),
        }
    }

    fn make_raw_block(payloads: &[&str], key: &KeyPair) -> (Vec<u8>, Block) {
        let txns: Vec<Transaction> = payloads
            .iter()
            .enumerate()
            .map(|(i, pl)| new_tx(i as u64, "bob", pl))
            .collect();
        let mut blk = Block::new(
            1,
            Hash::from_bytes({
                let mut h = [0u8; HASH_LEN];
                h[..3].copy_from_slice(&[1, 2, 3]);
                h
            }),
            Hash::from_bytes({
                let mut h = [0u8; HASH_LEN];
                h[..3].copy_from_slice(&[6, 7, 8]);
                h
            }),
            Hash::ZERO,
            Timestamp::from_millis(1_729_890_593_000),
            txns,
        );
        blk.sign(key.private_key());
        (blk.encode(), blk)
    }

    #[test]
    fn test_valid_block_signature() {
        let key = KeyPair::generate(KeyType::Secp256k1);
        let (raw, _) = make_raw_block(&["tx1"], &key);
        let blk = Block::decode(&raw).unwrap();
        assert!(blk.verify_signature(key.public_key()));
    }

    #[test]
    fn test_valid_transaction_index() {
        let key = KeyPair::generate(KeyType::Secp256k1);
        let (raw, blk) = make_raw_block(&["tx1", "transaction2", "tx3"], &key);

        let raw_tx = get_raw_block_tx(&raw, 1).unwrap();
        assert_eq!(raw_tx, blk.txns[1].encode());

        assert!(matches!(
            get_raw_block_tx(&raw, 3),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn test_oversized_length_in_tx_walk() {
        let header = BlockHeader {
            height: 1,
            num_txns: 1,
            ..Default::default()
        };
        let mut buf = header.encode();
        put_u32_raw(&mut buf, 1 << 30);

        assert!(get_raw_block_tx(&buf, 0).is_err());
    }

    #[test]
    fn test_index_out_of_range() {
        let key = KeyPair::generate(KeyType::Secp256k1);
        let (raw, _) = make_raw_block(&["tx1"], &key);
        assert!(matches!(
            get_raw_block_tx(&raw, 1),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn test_empty_block_has_no_txns() {
        let key = KeyPair::generate(KeyType::Secp256k1);
        let (raw, _) = make_raw_block(&[], &key);
        assert!(matches!(
            get_raw_block_tx(&raw, 0),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn test_corrupted_block_data() {
        let key = KeyPair::generate(KeyType::Secp256k1);
        let (raw, blk) = make_raw_block(&["tx1"], &key);

        let chop = blk.signature.len() + 4 + 1;
        let corrupted = &raw[..raw.len() - chop];
        assert!(get_raw_block_tx(corrupted, 0).is_err());
    }

    #[test]
    fn test_block_roundtrip_empty() {
        let blk = Block {
            header: BlockHeader {
                version: 1,
                height: 100,
                num_txns: 0,
                prev_hash: Hash::digest(b"prev"),
                prev_app_hash: Hash::digest(b"app"),
                validator_set_hash: Hash::digest(b"vals"),
                timestamp: Timestamp::from_millis(1_729_890_593_000),
                merkle_root: Hash::ZERO,
            },
            txns: vec![],
            signature: b"test-signature".to_vec(),
        };

        let decoded = Block::decode(&blk.encode()).unwrap();
        assert_eq!(blk, decoded);
    }

    #[test]
    fn test_block_roundtrip_with_txns() {
        let txns = vec![
            new_tx(0, "bob", "tx1"),
            new_tx(1, "bob", "transaction 2"),
            new_tx(0, "alice", &"x".repeat(1000)),
        ];
        let mut blk = Block::new(
            100,
            Hash::digest(b"prev"),
            Hash::digest(b"app"),
            Hash::digest(b"vals"),
            Timestamp::from_millis(1_729_890_593_000),
            txns,
        );
        blk.signature = b"test-signature-long".to_vec();

        let decoded = Block::decode(&blk.encode()).unwrap();
        assert_eq!(blk, decoded);
    }

    #[test]
    fn test_decode_invalid_signature_length() {
        let header = BlockHeader {
            height: 1,
            num_txns: 0,
            ..Default::default()
        };
        let mut buf = header.encode();
        put_u32_raw(&mut buf, 1 << 31);

        let err = Block::decode(&buf).unwrap_err();
        assert!(err.to_string().contains("invalid signature length"));
    }

    #[test]
    fn test_decode_invalid_transaction_length() {
        let header = BlockHeader {
            height: 1,
            num_txns: 1,
            ..Default::default()
        };
        let mut buf = header.encode();
        put_u32_raw(&mut buf, 3);
        buf.extend_from_slice(b"sig");
        put_u32_raw(&mut buf, 1 << 31);

        let err = Block::decode(&buf).unwrap_err();
        assert!(err.to_string().contains("invalid transaction length"));
    }

    #[test]
    fn test_decode_truncated() {
        let mut blk = Block::new(
            100,
            Hash::ZERO,
            Hash::ZERO,
            Hash::ZERO,
            Timestamp::from_millis(1),
            vec![new_tx(0, "bob", "a")],
        );
        blk.signature = b"sig".to_vec();
        let encoded = blk.encode();

        assert!(Block::decode(&encoded[..encoded.len() - 10]).is_err());
    }

    fn leaf(fill: &[u8]) -> Hash {
        let mut h = [0u8; HASH_LEN];
        h[..fill.len()].copy_from_slice(fill);
        Hash::from_bytes(h)
    }

    fn digest_pair(a: &Hash, b: &Hash) -> Hash {
        let mut buf = [0u8; 2 * HASH_LEN];
        buf[..HASH_LEN].copy_from_slice(a.as_bytes());
        buf[HASH_LEN..].copy_from_slice(b.as_bytes());
        Hash::digest(&buf)
    }

    #[test]
    fn test_merkle_empty() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);
    }

    #[test]
    fn test_merkle_single_leaf() {
        let l = leaf(&[1, 2, 3, 4]);
        assert_eq!(merkle_root(&[l]), l);
    }

    #[test]
    fn test_merkle_two_leaves() {
        let l1 = leaf(&[1, 2, 3, 4]);
        let l2 = leaf(&[5, 6, 7, 8]);
        assert_eq!(merkle_root(&[l1, l2]), digest_pair(&l1, &l2));
    }

    #[test]
    fn test_merkle_five_leaves_structure() {
        let leaves: Vec<Hash> = (1u8..=5).map(|i| leaf(&[i, i, i, i])).collect();
        let root = merkle_root(&leaves);

        let h01 = digest_pair(&leaves[0], &leaves[1]);
        let h23 = digest_pair(&leaves[2], &leaves[3]);
        let h44 = digest_pair(&leaves[4], &leaves[4]);
        let h0123 = digest_pair(&h01, &h23);
        let h4444 = digest_pair(&h44, &h44);
        assert_eq!(root, digest_pair(&h0123, &h4444));
    }

    #[test]
    fn test_merkle_order_sensitive() {
        let mut leaves: Vec<Hash> = (1u8..=4).map(|i| leaf(&[i, i, i, i])).collect();
        let root1 = merkle_root(&leaves);
        leaves.swap(0, 1);
        let root2 = merkle_root(&leaves);
        assert_ne!(root1, root2);
    }

    #[test]
    fn test_merkle_preserves_input() {
        let original: Vec<Hash> = (1u8..=3).map(|i| leaf(&[i, i, i, i])).collect();
        let snapshot = original.clone();
        merkle_root(&original);
        assert_eq!(original, snapshot);
    }

    #[test]
    fn test_merkle_deterministic() {
        let leaves: Vec<Hash> = (0..1000u32)
            .map(|i| Hash::digest(&i.to_le_bytes()))
            .collect();
        let root = merkle_root(&leaves);
        assert_ne!(root, Hash::ZERO);
        assert_eq!(root, merkle_root(&leaves));
    }
}
