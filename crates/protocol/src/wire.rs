//! Chunk-echo wire format.
//!
//! # Wire format
//!
//! ```text
//! SIZE HANDSHAKE:
//!   Client -> Device: [ASCII decimal total_chunks, no prefix, no delimiter]
//!   Device -> Client: [same ASCII string, exactly digit_count(total_chunks) bytes]
//!
//! PER CHUNK (total_chunks times):
//!   Client -> Device: [1..=128 bytes raw file data]
//!   Device -> Client: [the same bytes echoed back]
//!
//! COMPLETION:
//!   Client -> Device: "DONE"
//!   Device -> Client: "DONE"
//! ```
//!
//! There is no length framing: every read on either side expects an exact
//! byte count known from the previous step.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{DONE_SIGNAL, MAX_COUNT_DIGITS};
use crate::error::ProtocolError;

/// Number of chunks needed for `file_size` bytes (ceiling division).
pub fn total_chunks(file_size: u64, chunk_size: usize) -> u64 {
    file_size.div_ceil(chunk_size as u64)
}

/// Number of decimal digits in `n`. Zero has one digit.
pub fn digit_count(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Encodes a chunk count as the ASCII decimal string sent on the wire.
pub fn encode_chunk_count(total_chunks: u64) -> String {
    total_chunks.to_string()
}

/// Decodes an ASCII decimal chunk count.
pub fn parse_chunk_count(bytes: &[u8]) -> Result<u64, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::EmptyCount);
    }
    let text = String::from_utf8_lossy(bytes);
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::InvalidCount(text.into_owned()));
    }
    text.parse::<u64>()
        .map_err(|_| ProtocolError::InvalidCount(text.into_owned()))
}

/// Writes the chunk count and flushes.
pub async fn write_chunk_count<W: AsyncWrite + Unpin>(
    writer: &mut W,
    total_chunks: u64,
) -> Result<(), ProtocolError> {
    writer
        .write_all(encode_chunk_count(total_chunks).as_bytes())
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a chunk count on the device side.
///
/// The count carries no delimiter, so this takes whatever a single read
/// returns, the way the firmware drains its receive buffer.
pub async fn read_chunk_count<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, ProtocolError> {
    let mut buf = [0u8; MAX_COUNT_DIGITS];
    let n = reader.read(&mut buf).await?;
    parse_chunk_count(&buf[..n])
}

/// Writes one chunk of raw data and flushes.
pub async fn write_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes the completion signal and flushes.
pub async fn write_done<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), ProtocolError> {
    writer.write_all(DONE_SIGNAL).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly `len` bytes, or fewer if the peer closes the stream first.
///
/// A short result is not an error here: callers compare it against what
/// they expected and report the mismatch with the bytes actually received.
pub async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
