//! Host identity derivation
//!
//! A node's transport identity is derived from its validator key, and a
//! sender's public key is recovered from its peer id. Both schemes we use
//! produce peer ids that inline the public key (identity multihash), so the
//! mapping is exact in both directions.

use libp2p::identity;
use libp2p::PeerId;

use quoranet_crypto::{KeyType, PrivateKey, PublicKey};

use crate::error::P2pError;
use crate::P2pResult;

/// Multihash code for an identity (inlined) digest.
const MULTIHASH_IDENTITY: u64 = 0x00;

/// Build the libp2p host keypair from the node's validator key.
pub fn host_keypair(key: &PrivateKey) -> P2pResult<identity::Keypair> {
    match key {
        PrivateKey::Ed25519(_) => {
            let mut secret = key.to_bytes();
            identity::Keypair::ed25519_from_bytes(&mut *secret)
                .map_err(|e| P2pError::Transport(e.to_string()))
        }
        PrivateKey::Secp256k1(_) => {
            let mut secret = key.to_bytes();
            let sk = identity::secp256k1::SecretKey::try_from_bytes(&mut *secret)
                .map_err(|e| P2pError::Transport(e.to_string()))?;
            Ok(identity::secp256k1::Keypair::from(sk).into())
        }
    }
}

/// The peer id a node with the given public key advertises.
pub fn peer_id_for(public_key: &PublicKey) -> P2pResult<PeerId> {
    let host_key: identity::PublicKey = match public_key {
        PublicKey::Ed25519(_) => identity::ed25519::PublicKey::try_from_bytes(
            &public_key.to_bytes(),
        )
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .into(),
        PublicKey::Secp256k1(_) => identity::secp256k1::PublicKey::try_from_bytes(
            &public_key.to_bytes(),
        )
        .map_err(|e| P2pError::Transport(e.to_string()))?
        .into(),
    };
    Ok(host_key.to_peer_id())
}

/// Recover the sender public key embedded in a peer id.
///
/// Fails on peer ids that hash their key instead of inlining it, and on
/// schemes the vote layer does not know; such senders are dropped.
pub fn pubkey_from_peer_id(peer: &PeerId) -> P2pResult<PublicKey> {
    let mh: libp2p::multihash::Multihash<64> = (*peer).into();
    if mh.code() != MULTIHASH_IDENTITY {
        return Err(P2pError::OpaquePeerId);
    }
    let host_key = identity::PublicKey::try_decode_protobuf(mh.digest())
        .map_err(|_| P2pError::OpaquePeerId)?;

    if let Ok(ed) = host_key.clone().try_into_ed25519() {
        return PublicKey::from_bytes(KeyType::Ed25519, &ed.to_bytes())
            .map_err(|_| P2pError::OpaquePeerId);
    }
    if let Ok(secp) = host_key.try_into_secp256k1() {
        return PublicKey::from_bytes(KeyType::Secp256k1, &secp.to_bytes())
            .map_err(|_| P2pError::OpaquePeerId);
    }
    Err(P2pError::UnsupportedKeyScheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoranet_crypto::KeyPair;

    #[test]
    fn test_peer_id_roundtrip() {
        for kt in [KeyType::Ed25519, KeyType::Secp256k1] {
            let kp = KeyPair::generate(kt);
            let host = host_keypair(kp.private_key()).unwrap();
            let peer = PeerId::from(host.public());

            // the advertised id matches the one derived from the public key
            assert_eq!(peer, peer_id_for(kp.public_key()).unwrap());

            // and the public key is recoverable from the id alone
            let recovered = pubkey_from_peer_id(&peer).unwrap();
            assert_eq!(recovered, *kp.public_key());
        }
    }

    #[test]
    fn test_distinct_keys_distinct_peers() {
        let a = KeyPair::generate(KeyType::Ed25519);
        let b = KeyPair::generate(KeyType::Ed25519);
        assert_ne!(
            peer_id_for(a.public_key()).unwrap(),
            peer_id_for(b.public_key()).unwrap()
        );
    }
}
