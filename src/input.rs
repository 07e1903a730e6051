//! Turning raw socket bytes into command frames.
//!
//! A [`FrameDecoder`] owns the bytes a connection has received but not yet consumed.
//! Each call to [`FrameDecoder::decode`] drains every complete command array from the
//! front of that buffer, keeping the exact request bytes alongside the parsed items so
//! they can be propagated verbatim and counted towards replication offsets.
//!
//! On a replica's link to its master the decoder additionally expects one snapshot
//! payload (`$<len>\r\n<bytes>` without a trailing CRLF) right after the handshake.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::resp::{find_crlf, RespError, RespValue};

const READ_CHUNK_SIZE: usize = 4096;

/// Errors that can occur while reading from a connection.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
    #[error("invalid response from master: {0}")]
    InvalidResponseFromMaster(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A command array. `raw` is the exact byte range it was decoded from.
    Command { items: Vec<String>, raw: Bytes },
    /// The snapshot payload a master sends after `+FULLRESYNC`.
    Snapshot(Bytes),
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    snapshot_pending: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder for the replica side of a master link. `leftover` holds whatever the
    /// handshake read past the `+FULLRESYNC` line.
    pub fn for_master_link(leftover: BytesMut) -> Self {
        Self {
            buffer: leftover,
            snapshot_pending: true,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drains every complete frame currently buffered. A trailing partial frame stays
    /// buffered for the next call.
    pub fn decode(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();

        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }

        frames
    }

    /// Reads from `reader` until at least one frame is available.
    pub async fn read_frames<R>(&mut self, reader: &mut R) -> Result<Vec<Frame>, CommandReadError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let frames = self.decode();

            if !frames.is_empty() {
                return Ok(frames);
            }

            self.buffer.reserve(READ_CHUNK_SIZE);

            let number_of_bytes = reader
                .read_buf(&mut self.buffer)
                .await
                .map_err(|e| CommandReadError::IoError(e.to_string()))?;

            if number_of_bytes == 0 {
                return Err(CommandReadError::ConnectionClosed);
            }
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }

            if self.snapshot_pending && self.buffer[0] == b'$' {
                match self.take_snapshot() {
                    Ok(frame) => return frame,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed snapshot header");
                        continue;
                    }
                }
            }

            let line_end = find_crlf(&self.buffer)?;

            if !is_array_header(&self.buffer[..line_end]) {
                warn!(
                    fragment = %String::from_utf8_lossy(&self.buffer[..line_end]),
                    "Skipping malformed fragment"
                );
                self.buffer.advance(line_end + 2);
                continue;
            }

            match RespValue::parse(&self.buffer) {
                Ok((RespValue::Array(values), used)) => {
                    let raw = self.buffer.split_to(used).freeze();

                    match command_items(values) {
                        Some(items) => return Some(Frame::Command { items, raw }),
                        None => debug!("Skipping array without command items"),
                    }
                }
                Ok((_, used)) => self.buffer.advance(used),
                Err(RespError::Incomplete) => return None,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed frame header");
                    self.buffer.advance(line_end + 2);
                }
            }
        }
    }

    /// `Ok(None)` means the payload has not fully arrived yet.
    fn take_snapshot(&mut self) -> Result<Option<Frame>, RespError> {
        let Some(line_end) = find_crlf(&self.buffer) else {
            return Ok(None);
        };

        let length = std::str::from_utf8(&self.buffer[1..line_end])
            .ok()
            .and_then(|length| length.parse::<usize>().ok());

        let Some(length) = length else {
            self.buffer.advance(line_end + 2);
            self.snapshot_pending = false;
            return Err(RespError::InvalidBulkString);
        };

        let payload_start = line_end + 2;

        if self.buffer.len() < payload_start + length {
            return Ok(None);
        }

        self.buffer.advance(payload_start);
        let payload = self.buffer.split_to(length).freeze();
        self.snapshot_pending = false;

        Ok(Some(Frame::Snapshot(payload)))
    }
}

/// `*` followed only by digits.
fn is_array_header(line: &[u8]) -> bool {
    line.len() > 1 && line[0] == b'*' && line[1..].iter().all(u8::is_ascii_digit)
}

fn command_items(values: Vec<RespValue>) -> Option<Vec<String>> {
    if values.is_empty() {
        return None;
    }

    values
        .into_iter()
        .map(|value| match value {
            RespValue::BulkString(item) | RespValue::SimpleString(item) => Some(item),
            RespValue::Integer(item) => Some(item.to_string()),
            _ => None,
        })
        .collect()
}

/// Reads a single RESP value, used for replies during the replication handshake.
/// Bytes read past the value stay in `buffer`.
pub async fn read_reply<R>(reader: &mut R, buffer: &mut BytesMut) -> Result<RespValue, CommandReadError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match RespValue::parse(buffer) {
            Ok((value, used)) => {
                buffer.advance(used);
                return Ok(value);
            }
            Err(RespError::Incomplete) => {}
            Err(e) => return Err(e.into()),
        }

        buffer.reserve(READ_CHUNK_SIZE);

        let number_of_bytes = reader
            .read_buf(buffer)
            .await
            .map_err(|e| CommandReadError::IoError(e.to_string()))?;

        if number_of_bytes == 0 {
            return Err(CommandReadError::ConnectionClosed);
        }
    }
}
