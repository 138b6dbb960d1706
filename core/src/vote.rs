//! Validator votes and commit records
//!
//! A validator answers a proposed block with an ACK (agree, committing to
//! the post-execution app hash), a plain NACK, or a NACK carrying its own
//! divergent app hash as evidence. The leader aggregates the votes it
//! gossips back into a [`CommitInfo`] persisted with the block.
//!
//! The signed payload commits to the app hash only for positive votes; a
//! negative vote signs the same bytes with or without divergence evidence,
//! the evidence itself travels in the vote record.

use std::fmt;

use crate::codec::{get_i64, get_u32, get_u8, put_i64, put_u32};
use crate::error::CoreError;
use crate::types::{Hash, Signature, HASH_LEN};
use crate::CoreResult;
use quoranet_crypto::{sign, verify_signature, PrivateKey};

/// Vote disposition tag. The discriminant is the wire encoding; the zero
/// value is `Disagree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AckStatus {
    #[default]
    Disagree = 0,
    Agree = 1,
    Diverge = 2,
}

impl AckStatus {
    pub fn from_u8(tag: u8) -> CoreResult<Self> {
        match tag {
            0 => Ok(AckStatus::Disagree),
            1 => Ok(AckStatus::Agree),
            2 => Ok(AckStatus::Diverge),
            other => Err(CoreError::InvalidAckStatus(other)),
        }
    }
}

/// The canonical signed payload for a vote on `blk_id`.
///
/// Positive votes must commit to an app hash; negative votes never include
/// one (divergence evidence rides in the vote record, not the signature).
fn vote_msg(blk_id: &Hash, ack: bool, app_hash: Option<&Hash>) -> CoreResult<Vec<u8>> {
    let mut msg = Vec::with_capacity(2 * HASH_LEN + 1);
    msg.extend_from_slice(blk_id.as_bytes());
    if ack {
        let ah = app_hash.ok_or(CoreError::MissingAppHash)?;
        msg.push(1);
        msg.extend_from_slice(ah.as_bytes());
    } else {
        msg.push(0);
    }
    Ok(msg)
}

/// Sign a vote on a block.
///
/// Fails when `ack` is true and no app hash is given: a positive vote that
/// does not commit to the resulting state is meaningless.
pub fn sign_vote(
    blk_id: Hash,
    ack: bool,
    app_hash: Option<&Hash>,
    key: &PrivateKey,
) -> CoreResult<Signature> {
    let msg = vote_msg(&blk_id, ack, app_hash)?;
    let data = sign(key, &msg);
    let public = key.public_key();
    Ok(Signature::new(data, public.to_bytes(), public.key_type()))
}

/// One validator's vote as aggregated by the leader.
///
/// Wire form: signature || status u8 || (app hash iff `Diverge`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoteInfo {
    pub signature: Signature,
    pub ack_status: AckStatus,
    pub app_hash: Option<Hash>,
}

impl VoteInfo {
    pub fn write_to(&self, out: &mut Vec<u8>) -> CoreResult<()> {
        self.signature.write_to(out);
        out.push(self.ack_status as u8);
        if self.ack_status == AckStatus::Diverge {
            let ah = self.app_hash.ok_or(CoreError::DivergeWithoutAppHash)?;
            out.extend_from_slice(ah.as_bytes());
        }
        Ok(())
    }

    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn read_from(input: &mut &[u8]) -> CoreResult<Self> {
        let signature = Signature::read_from(input)?;
        let ack_status = AckStatus::from_u8(get_u8(input)?)?;
        let app_hash = if ack_status == AckStatus::Diverge {
            Some(Hash::read_from(input)?)
        } else {
            None
        };
        Ok(VoteInfo {
            signature,
            ack_status,
            app_hash,
        })
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        Self::read_from(&mut cur)
    }

    /// Check the vote signature against the block id and the leader's app
    /// hash, reconstructing the signed payload per [`AckStatus`].
    ///
    /// A `Diverge` vote without its own app hash is rejected before the
    /// signature is looked at.
    pub fn verify(&self, blk_id: Hash, app_hash: Hash) -> CoreResult<()> {
        let msg = match self.ack_status {
            AckStatus::Agree => vote_msg(&blk_id, true, Some(&app_hash))?,
            AckStatus::Disagree => vote_msg(&blk_id, false, None)?,
            AckStatus::Diverge => {
                let own = self
                    .app_hash
                    .as_ref()
                    .ok_or(CoreError::DivergeWithoutAppHash)?;
                vote_msg(&blk_id, false, Some(own))?
            }
        };
        verify_signature(
            &self.signature.pub_key,
            self.signature.key_type,
            &msg,
            &self.signature.data,
        )?;
        Ok(())
    }
}

/// The aggregated outcome of a block: the agreed app hash and every vote.
///
/// Wire form: app hash || u32le vote count || votes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitInfo {
    pub app_hash: Hash,
    pub votes: Vec<VoteInfo>,
}

impl CommitInfo {
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(self.app_hash.as_bytes());
        put_u32(&mut out, self.votes.len() as u32);
        for vote in &self.votes {
            vote.write_to(&mut out)?;
        }
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let app_hash = Hash::read_from(&mut cur)?;
        let count = get_u32(&mut cur)?;
        let mut votes = Vec::new();
        for _ in 0..count {
            votes.push(VoteInfo::read_from(&mut cur)?);
        }
        Ok(CommitInfo { app_hash, votes })
    }
}

/// A validator's vote as gossiped to the leader on the ACK topic.
///
/// Carries the signer identity inside the signed payload so the vote stays
/// verifiable independently of the transport envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckRes {
    pub ack: bool,
    pub height: i64,
    pub blk_hash: Hash,
    pub app_hash: Option<Hash>,
    pub signature: Signature,
}

impl AckRes {
    /// Vote disposition: ACK, plain NACK, or NACK with divergence evidence.
    pub fn ack_status(&self) -> AckStatus {
        if self.ack {
            AckStatus::Agree
        } else if self.app_hash.is_some() {
            AckStatus::Diverge
        } else {
            AckStatus::Disagree
        }
    }

    /// The vote record the leader aggregates into a [`CommitInfo`].
    pub fn into_vote_info(self) -> VoteInfo {
        let ack_status = self.ack_status();
        VoteInfo {
            signature: self.signature,
            ack_status,
            app_hash: match ack_status {
                AckStatus::Diverge => self.app_hash,
                _ => None,
            },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.ack as u8);
        put_i64(&mut out, self.height);
        out.extend_from_slice(self.blk_hash.as_bytes());
        match &self.app_hash {
            Some(ah) => {
                out.push(1);
                out.extend_from_slice(ah.as_bytes());
            }
            None => out.push(0),
        }
        self.signature.write_to(&mut out);
        out
    }

    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cur = data;
        let ack = get_u8(&mut cur)? != 0;
        let height = get_i64(&mut cur)?;
        let blk_hash = Hash::read_from(&mut cur)?;
        let app_hash = if get_u8(&mut cur)? != 0 {
            Some(Hash::read_from(&mut cur)?)
        } else {
            None
        };
        let signature = Signature::read_from(&mut cur)?;
        Ok(AckRes {
            ack,
            height,
            blk_hash,
            app_hash,
            signature,
        })
    }
}

impl fmt::Display for AckRes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ack{{{} height:{} blk:{}}}",
            if self.ack { "ACK" } else { "NACK" },
            self.height,
            self.blk_hash
        )
    }
}
