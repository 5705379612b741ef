//! Line framing shared by both ends of the socket
//!
//! Every message is one JSON document followed by `\n`. Reads are bounded
//! before buffering, so a peer that never sends a newline costs at most
//! `limit + 1` bytes.

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Largest request line a client may send
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Largest response line the daemon may send
///
/// Names are capped at `MAX_USER_ID_LEN` bytes and links at 2 KiB, so even
/// a fully escaped `PAIRED` answer stays well below this.
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024;

/// Read one newline-terminated line of at most `limit` bytes
pub async fn read_line_limited<R>(reader: R, limit: usize) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let mut bounded = BufReader::new(reader.take(limit as u64 + 1));
    bounded.read_until(b'\n', &mut line).await.context("Failed to read line")?;

    if line.is_empty() {
        eyre::bail!("Connection closed before a line arrived");
    }
    // Only a line that ran into the `take` bound lacks its newline while over the limit
    if line.last() != Some(&b'\n') && line.len() > limit {
        eyre::bail!("Line exceeds {} bytes", limit);
    }

    let text = String::from_utf8(line).context("Line is not valid UTF-8")?;
    Ok(text.trim_end().to_string())
}

/// Write `line` plus the terminating newline and flush
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await.context("Failed to write line")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush")?;
    Ok(())
}
