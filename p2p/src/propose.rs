//! Block-proposal stream protocol
//!
//! One bidirectional stream per announcement. The announcer (the leader, or
//! a validator re-announcing) writes the compact [`BlockProp`] and waits for
//! the literal pull token; the receiver asks the consensus engine whether it
//! wants the contents before pulling the full block.
//!
//! ```text
//! announcer                        receiver
//!   BlockProp  ─────────────────▶  decode, CE.accept_proposal
//!              ◀─────── "get" ───  (or close to decline)
//!   raw block  ─────────────────▶  decode, check height+hash, CE.notify
//!   close
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use quoranet_core::{Block, BlockProp, Engine};

use crate::error::P2pError;
use crate::P2pResult;

/// The literal pull-request token. Any other reply is a cancellation.
pub const GET_MSG: &[u8; 3] = b"get";

/// Fixed-size prefix of an encoded [`BlockProp`]: height, two hashes,
/// stamp, and the signature length.
const PROP_HEAD_LEN: usize = 8 + 32 + 32 + 8 + 8;

/// Announcer half: advertise `prop` and serve the encoded block if the
/// peer pulls it within `op_timeout`.
pub async fn advertise_block<S>(
    stream: &mut S,
    prop: &BlockProp,
    raw_block: &[u8],
    op_timeout: Duration,
) -> P2pResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    timeout(op_timeout, async {
        stream.write_all(&prop.encode()).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| P2pError::Timeout)??;

    let mut token = [0u8; GET_MSG.len()];
    match timeout(op_timeout, stream.read_exact(&mut token)).await {
        Err(_) => return Err(P2pError::Timeout),
        // EOF or a short reply is a cancellation from the receiver
        Ok(Err(_)) => return Err(P2pError::Declined),
        Ok(Ok(())) => {
            if &token != GET_MSG {
                return Err(P2pError::Declined);
            }
        }
    }

    timeout(op_timeout, async {
        stream.write_all(raw_block).await?;
        stream.flush().await?;
        stream.close().await
    })
    .await
    .map_err(|_| P2pError::Timeout)??;

    debug!(height = prop.height, hash = %prop.hash, "served block proposal");
    Ok(())
}

/// Read an encoded [`BlockProp`] off the front of a stream.
async fn read_block_prop<S>(stream: &mut S) -> P2pResult<BlockProp>
where
    S: AsyncRead + Unpin + Send,
{
    let mut head = [0u8; PROP_HEAD_LEN];
    stream.read_exact(&mut head).await?;

    let sig_len = i64::from_le_bytes(head[PROP_HEAD_LEN - 8..].try_into().expect("8 bytes"));
    if !(0..=1000).contains(&sig_len) {
        return Err(quoranet_core::CoreError::InvalidSigLength.into());
    }

    let mut buf = Vec::with_capacity(PROP_HEAD_LEN + sig_len as usize);
    buf.extend_from_slice(&head);
    buf.resize(PROP_HEAD_LEN + sig_len as usize, 0);
    stream.read_exact(&mut buf[PROP_HEAD_LEN..]).await?;

    Ok(BlockProp::decode(&buf)?)
}

/// Receiver half: handle one inbound proposal stream.
///
/// Returns `Ok(())` both on delivery and on a clean decline by the
/// consensus engine; malformed announcements, mismatched contents, and
/// stream failures surface as errors for the caller to log.
pub async fn handle_propose_stream<S>(
    mut stream: S,
    ce: Arc<dyn Engine>,
    op_timeout: Duration,
) -> P2pResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let prop = timeout(op_timeout, read_block_prop(&mut stream))
        .await
        .map_err(|_| P2pError::Timeout)??;

    if !ce
        .accept_proposal(
            prop.height,
            prop.hash,
            prop.prev_hash,
            &prop.leader_sig,
            prop.stamp,
        )
        .await
    {
        debug!(height = prop.height, hash = %prop.hash, "do not want proposal content");
        return Ok(());
    }

    timeout(op_timeout, async {
        stream.write_all(GET_MSG).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| P2pError::Timeout)??;

    let mut raw = Vec::new();
    timeout(op_timeout, stream.read_to_end(&mut raw))
        .await
        .map_err(|_| P2pError::Timeout)??;

    let block = Block::decode(&raw)?;

    if block.header.height != prop.height {
        return Err(P2pError::HeightMismatch {
            wanted: prop.height,
            got: block.header.height,
        });
    }
    let hash = block.hash();
    if hash != prop.hash {
        return Err(P2pError::HashMismatch {
            wanted: prop.hash,
            got: hash,
        });
    }

    debug!(height = prop.height, %hash, "processing block proposal");
    ce.notify_block_proposal(block).await;
    Ok(())
}
