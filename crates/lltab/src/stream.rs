//! # Forward-Buffered Input Stream
//!
//! Speculative terminal matching needs to read ahead, fail, and back out.
//! [`SourceStream`] wraps any [`std::io::Read`] and buffers everything read
//! past the last committed token so that matchers can mark a position,
//! attempt a match, and either consume the matched prefix or restore the
//! mark.
//!
//! Positions are indices into the live buffer. [`SourceStream::seek`] is
//! only valid for positions still present in the buffer, i.e. taken after
//! the last [`SourceStream::shrink_to_position`]; shrinking commits the
//! consumed prefix and invalidates older positions.

use std::io::Read;

/// A forward-buffered byte stream with mark/restore support.
pub struct SourceStream<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    /// Total bytes committed out of the buffer, for error reporting.
    committed: usize,
    eof: bool,
}

impl<R: Read> SourceStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pos: 0,
            committed: 0,
            eof: false,
        }
    }

    fn fill_one(&mut self) -> bool {
        if self.eof {
            return false;
        }
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => {
                    self.eof = true;
                    return false;
                }
                Ok(_) => {
                    self.buffer.push(byte[0]);
                    return true;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => {
                    // Read failures terminate the stream like end of input.
                    self.eof = true;
                    return false;
                }
            }
        }
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        while self.pos >= self.buffer.len() {
            if !self.fill_one() {
                return None;
            }
        }
        Some(self.buffer[self.pos])
    }

    /// Consume and return the next byte.
    pub fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Current position within the live buffer.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Absolute byte offset from the start of the input.
    #[must_use]
    pub const fn absolute_position(&self) -> usize {
        self.committed + self.pos
    }

    /// Restore a previously recorded position.
    ///
    /// `pos` must have been taken after the last shrink.
    pub fn seek(&mut self, pos: usize) {
        debug_assert!(pos <= self.buffer.len());
        self.pos = pos;
    }

    /// Commit everything before the current position: the consumed prefix
    /// leaves the buffer and position `0` now denotes the current byte.
    pub fn shrink_to_position(&mut self) {
        self.committed += self.pos;
        self.buffer.drain(..self.pos);
        self.pos = 0;
    }

    /// The bytes between the buffer start and the current position, i.e.
    /// the text consumed since the last shrink.
    #[must_use]
    pub fn consumed_bytes(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }
}
