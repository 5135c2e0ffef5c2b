//! JSON-RPC framing codec for LSP communication.
//!
//! LSP uses `Content-Length: N\r\n\r\n{json}` framing over stdin/stdout.
//! [`FrameReader`] and [`FrameWriter`] move raw payload text; parsing is the
//! dispatcher's job so that one corrupt body costs one message, not the
//! session.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (16 MiB) to prevent unbounded memory allocation.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Reads `Content-Length` framed payloads from an async reader.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next payload.
    ///
    /// Returns `Ok(None)` on EOF between frames (clean shutdown).
    /// Returns `Err` on malformed headers, oversized frames or EOF mid-frame.
    /// Invalid UTF-8 in the body is replaced, not rejected.
    pub async fn read_frame(&mut self) -> Result<Option<String>> {
        let content_length = match self.read_headers().await? {
            Some(len) => len,
            None => return Ok(None),
        };

        if content_length > MAX_FRAME_BYTES {
            bail!(
                "LSP payload exceeds maximum size: {content_length} bytes (limit: {MAX_FRAME_BYTES} bytes)"
            );
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("Failed to read LSP payload")?;

        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }

    /// Parse headers until the empty line separator.
    ///
    /// Returns the `Content-Length` value, or `None` on EOF.
    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_any_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .context("Failed to read LSP header")?;

            if bytes_read == 0 {
                // Clean only if no header of this frame was read yet.
                if !saw_any_header_bytes {
                    return Ok(None);
                }
                bail!("unexpected EOF while reading LSP headers");
            }
            saw_any_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':')
                && key.trim().eq_ignore_ascii_case("Content-Length")
            {
                let len: usize = value
                    .trim()
                    .parse()
                    .context("Invalid LSP Content-Length header")?;
                content_length = Some(len);
            }
            // Other headers (Content-Type) are ignored.
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => bail!("LSP frame missing Content-Length"),
        }
    }
}

/// Writes `Content-Length` framed payloads to an async writer.
///
/// Error contexts use the wording the dead-session classifier recognises.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_payload(&mut self, payload: &str) -> Result<()> {
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("Failed to write LSP header")?;
        self.writer
            .write_all(payload.as_bytes())
            .await
            .context("Failed to write LSP payload")?;
        self.writer
            .flush()
            .await
            .context("Failed to flush LSP payload")?;

        Ok(())
    }
}
