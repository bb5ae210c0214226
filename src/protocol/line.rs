//! Line framing for the beacon protocol.
//!
//! Every message is a single UTF-8 line of space separated tokens:
//! ```text
//! ┌──────────┬─────┬──────────┬─────┬──────┐
//! │   KIND   │ ' ' │  token   │ ... │ '\n' │
//! └──────────┴─────┴──────────┴─────┴──────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::LineError;

/// Line terminator.
pub const LINE_END: u8 = b'\n';

/// Maximum line length, excluding the terminator.
pub const MAX_LINE_SIZE: usize = 4096;

/// Encodes tokens into a newline terminated line.
#[must_use]
pub fn encode<I, S>(tokens: I) -> Bytes
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buf = BytesMut::new();
    for (i, token) in tokens.into_iter().enumerate() {
        if i > 0 {
            buf.put_u8(b' ');
        }
        buf.put_slice(token.as_ref().as_bytes());
    }
    buf.put_u8(LINE_END);
    buf.freeze()
}

/// Line decoder that handles partial data.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    // Set after an over-long line until the next terminator is seen.
    discarding: bool,
}

impl LineDecoder {
    /// Creates a new line decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            discarding: false,
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete line.
    ///
    /// Returns `Ok(Some(line))` if a complete line was decoded, `Ok(None)`
    /// if more data is needed. A trailing `\r` is stripped and invalid
    /// UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::TooLong`] once for every line exceeding
    /// [`MAX_LINE_SIZE`]. The oversized line is dropped and decoding
    /// resumes after its terminator.
    pub fn decode(&mut self) -> Result<Option<String>, LineError> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == LINE_END) else {
                if self.buffer.len() > MAX_LINE_SIZE {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    if !self.discarding {
                        self.discarding = true;
                        return Err(LineError::TooLong {
                            size,
                            max: MAX_LINE_SIZE,
                        });
                    }
                }
                return Ok(None);
            };

            let line = self.buffer.split_to(end);
            self.buffer.advance(1);

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if line.len() > MAX_LINE_SIZE {
                return Err(LineError::TooLong {
                    size: line.len(),
                    max: MAX_LINE_SIZE,
                });
            }

            let text = String::from_utf8_lossy(&line);
            return Ok(Some(text.strip_suffix('\r').unwrap_or(&*text).to_owned()));
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}
