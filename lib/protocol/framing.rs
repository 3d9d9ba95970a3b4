//! Reassembly of inbound messages from raw socket reads.
//!
//! Peers send no terminator, so a message ends where the peer stops writing.
//! A read that comes back short normally closes the message. `FILE_CONTENT`
//! is the exception: its payload can be large enough to arrive as several
//! short reads, so it only closes at a newline, or once the peer has gone
//! quiet (see [`FrameBuffer::flush`]).

use super::message::{DELIMITER, TAG_FILE_CONTENT};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Per-connection buffer that turns reads into whole messages.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_len: usize,

    /// The last read filled the caller's buffer; more bytes are on their way.
    more_expected: bool,

    /// Dropping the tail of an oversized message.
    discarding: bool,
}

/// Outcome of appending one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    /// Bytes buffered; call [`FrameBuffer::next_message`] to drain.
    Buffered,

    /// The message grew past the size limit and was dropped.
    Oversized { limit: usize },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FrameBuffer {
    /// Create a buffer that drops any message longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            more_expected: false,
            discarding: false,
        }
    }

    /// Append the bytes of one read.
    ///
    /// `filled` is true when the read used the whole read buffer, which means
    /// the message almost certainly continues.
    pub fn push(&mut self, bytes: &[u8], filled: bool) -> Push {
        if self.discarding {
            self.discarding = filled;
            return Push::Buffered;
        }

        if self.buf.len() + bytes.len() > self.max_len {
            self.buf.clear();
            self.more_expected = false;
            self.discarding = filled;
            return Push::Oversized {
                limit: self.max_len,
            };
        }

        self.buf.extend_from_slice(bytes);
        self.more_expected = filled;
        Push::Buffered
    }

    /// Take the next complete message, if one is ready.
    pub fn next_message(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() || self.more_expected {
            return None;
        }

        if is_file_content(&self.buf) {
            // Base64 never contains a newline, so the first one ends the payload.
            let end = self.buf.iter().position(|&b| b == b'\n')?;
            let rest = self.buf.split_off(end + 1);
            return Some(std::mem::replace(&mut self.buf, rest));
        }

        Some(std::mem::take(&mut self.buf))
    }

    /// Whether bytes are waiting for the message to close.
    pub fn is_pending(&self) -> bool {
        !self.buf.is_empty() || self.discarding
    }

    /// Close whatever is buffered. Called once the peer goes quiet or disconnects.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.more_expected = false;
        self.discarding = false;
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn is_file_content(buf: &[u8]) -> bool {
    let start = buf
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(buf.len());
    let rest = &buf[start..];
    rest.starts_with(TAG_FILE_CONTENT.as_bytes())
        && rest.get(TAG_FILE_CONTENT.len()) == Some(&(DELIMITER as u8))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
