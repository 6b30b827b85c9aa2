//! Length-prefixed JSON framing for the dispatcher connection.
//!
//! Format: `[len: i32 big-endian][len bytes of UTF-8 JSON]`
//!
//! Decoding is incremental. Bytes are fed in whatever chunks the socket
//! delivers and at most one frame is assembled at a time: the length prefix
//! of the next frame is not looked at until the current payload has been
//! fully consumed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on a single payload. Anything larger is treated as a corrupt
/// length prefix rather than an allocation request.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Framing or payload errors on the dispatcher connection.
///
/// All of these are connection faults: the caller drops the connection and
/// reconnects with a fresh decoder.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A complete payload was not valid JSON for the expected message.
    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The length prefix decoded to a negative value.
    #[error("negative frame length: {0}")]
    NegativeLength(i32),

    /// The length prefix exceeds [`MAX_FRAME_LEN`].
    #[error("frame length {0} exceeds the 16 MiB limit")]
    FrameTooLarge(usize),
}

/// Encode a message as one frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    // Bounded by MAX_FRAME_LEN above, so the cast cannot truncate.
    frame.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Incremental frame decoder (the per-connection frame buffer).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Payload length of the frame being assembled, once its prefix is read.
    expected_len: Option<usize>,
    /// Bytes received but not yet consumed by a decoded frame.
    received: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.received.extend_from_slice(bytes);
    }

    /// Try to decode the next complete frame.
    ///
    /// Returns `Ok(None)` when more bytes are needed. After a frame is
    /// returned the buffer state is reset, so surplus bytes start the next
    /// frame only on the following call.
    pub fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        let expected_len = match self.expected_len {
            Some(len) => len,
            None => {
                if self.received.len() < LENGTH_PREFIX_LEN {
                    return Ok(None);
                }
                let mut prefix = [0u8; LENGTH_PREFIX_LEN];
                prefix.copy_from_slice(&self.received[..LENGTH_PREFIX_LEN]);
                let raw = i32::from_be_bytes(prefix);
                let len = usize::try_from(raw).map_err(|_| ProtocolError::NegativeLength(raw))?;
                if len > MAX_FRAME_LEN {
                    return Err(ProtocolError::FrameTooLarge(len));
                }
                self.received.drain(..LENGTH_PREFIX_LEN);
                self.expected_len = Some(len);
                len
            }
        };

        if self.received.len() < expected_len {
            return Ok(None);
        }

        let payload: Vec<u8> = self.received.drain(..expected_len).collect();
        self.expected_len = None;
        Ok(Some(serde_json::from_slice(&payload)?))
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.expected_len.is_none() && self.received.is_empty()
    }
}
