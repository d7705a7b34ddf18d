//! Decoding and classification of received chunks.
//!
//! Reads return arbitrary byte slices, so a multi-byte UTF-8 character can
//! be split between two reads. [`ChunkDecoder`] holds such an incomplete
//! tail back until the next read instead of failing the chunk.

use thiserror::Error;

use crate::command::PING_CHALLENGE;

/// Longest incomplete UTF-8 sequence that can be carried to the next read.
const MAX_PENDING: usize = 3;

/// A received chunk could not be decoded as UTF-8.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid UTF-8 after {valid_up_to} of {len} bytes")]
    InvalidUtf8 { valid_up_to: usize, len: usize },
}

/// What a decoded chunk means to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The chunk contains the keep-alive challenge; reply and log nothing
    KeepAlive,
    /// Anything else, forwarded verbatim to the log
    Text(String),
}

impl Inbound {
    /// Classifies decoded text.
    pub fn classify(text: String) -> Self {
        if text.contains(PING_CHALLENGE) {
            Inbound::KeepAlive
        } else {
            Inbound::Text(text)
        }
    }
}

/// Per-connection UTF-8 decoder.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one received chunk.
    ///
    /// Returns `Ok(None)` when every byte was held back as part of an
    /// incomplete character. On invalid input the whole chunk, including
    /// any held-back bytes, is discarded.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Option<String>, DecodeError> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let decoded = std::str::from_utf8(&buf).map(str::to_owned);
        match decoded {
            Ok(text) => Ok(non_empty(text)),
            Err(e) if e.error_len().is_none() && buf.len() - e.valid_up_to() <= MAX_PENDING => {
                self.pending = buf.split_off(e.valid_up_to());
                Ok(non_empty(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(e) => Err(DecodeError::InvalidUtf8 {
                valid_up_to: e.valid_up_to(),
                len: buf.len(),
            }),
        }
    }

    /// Number of bytes held back from previous reads.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
