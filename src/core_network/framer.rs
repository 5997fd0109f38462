//! Control channel framer.
//!
//! One stream carries two kinds of traffic: newline-terminated control lines
//! and raw binary payloads of a declared length. The framer never decides
//! which kind comes next; the caller does, based on where it is in the
//! protocol. Bytes pulled off the stream while looking for a line delimiter
//! are kept in a carry-over buffer and handed out first by the next read of
//! either kind, so nothing is lost or read twice across the boundary.

use crate::constants::{LINE_DELIMITER, READ_BUFFER_SIZE};
use crate::core_network::message::ControlMessage;
use crate::error::{Result, XferError};
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub struct Framer<S> {
    stream: S,
    carry: Vec<u8>,
    max_line_length: usize,
    idle_timeout: Option<Duration>,
}

impl<S> Framer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, max_line_length: usize, idle_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            carry: Vec::with_capacity(READ_BUFFER_SIZE),
            max_line_length,
            idle_timeout,
        }
    }

    /// Bytes received but not yet handed out.
    pub fn carry_over(&self) -> &[u8] {
        &self.carry
    }

    /// Reads the next control line with the delimiter stripped.
    ///
    /// Returns `Ok(None)` when the peer closes before a delimiter arrives.
    /// Any unterminated bytes are discarded in that case.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.next_line(false).await
    }

    /// Like [`Framer::read_line`], but an unterminated tail left when the peer
    /// closes is returned as a final line.
    pub async fn read_line_flushing(&mut self) -> Result<Option<String>> {
        self.next_line(true).await
    }

    async fn next_line(&mut self, flush_partial: bool) -> Result<Option<String>> {
        let mut scanned = 0;
        loop {
            if let Some(offset) = self.carry[scanned..]
                .iter()
                .position(|&b| b == LINE_DELIMITER)
            {
                let end = scanned + offset;
                let mut line: Vec<u8> = self.carry.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return decode_line(line).map(Some);
            }

            scanned = self.carry.len();
            if scanned > self.max_line_length {
                return Err(XferError::LineTooLong(self.max_line_length));
            }

            if self.fill().await? == 0 {
                if flush_partial && !self.carry.is_empty() {
                    let line = std::mem::take(&mut self.carry);
                    return decode_line(line).map(Some);
                }
                if !self.carry.is_empty() {
                    debug!("Discarding {} unterminated bytes at end of stream", self.carry.len());
                    self.carry.clear();
                }
                return Ok(None);
            }
        }
    }

    /// Reads exactly `n` payload bytes.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact_into(&mut buf).await?;
        Ok(buf)
    }

    /// Fills `buf` completely: carry-over bytes first, then straight from the
    /// stream without scanning for delimiters. A peer close before the buffer
    /// is full yields [`XferError::Truncated`].
    pub async fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let wanted = buf.len();
        let from_carry = wanted.min(self.carry.len());
        buf[..from_carry].copy_from_slice(&self.carry[..from_carry]);
        self.carry.drain(..from_carry);

        let mut filled = from_carry;
        while filled < wanted {
            let n = self.read_stream(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(XferError::Truncated {
                    expected: wanted as u64,
                    received: filled as u64,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Writes `text` followed by the line delimiter in a single write.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        if text.as_bytes().contains(&LINE_DELIMITER) {
            return Err(XferError::Protocol(
                "Control message contains an embedded newline.".to_string(),
            ));
        }
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(LINE_DELIMITER);
        trace!("-> {}", text);
        self.stream.write_all(&line).await.map_err(lost)?;
        self.stream.flush().await.map_err(lost)
    }

    pub async fn write_message(&mut self, message: &ControlMessage) -> Result<()> {
        self.write_line(&message.encode()).await
    }

    /// Writes raw payload bytes. Call [`Framer::flush`] once the payload is done.
    pub async fn write_payload(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await.map_err(lost)
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await.map_err(lost)
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(lost)
    }

    async fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_BUFFER_SIZE];
        let n = self.read_stream(&mut chunk).await?;
        self.carry.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    async fn read_stream(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.stream.read(buf);
        let n = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| XferError::Timeout(limit))?,
            None => read.await,
        };
        n.map_err(lost)
    }
}

fn decode_line(line: Vec<u8>) -> Result<String> {
    String::from_utf8(line)
        .map_err(|_| XferError::Protocol("Control line is not valid UTF-8.".to_string()))
}

fn lost(e: std::io::Error) -> XferError {
    XferError::ConnectionLost(e.to_string())
}
