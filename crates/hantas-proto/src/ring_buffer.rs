//! Fixed-capacity circular byte store (C1).
//!
//! Capacity is rounded up to the next power of two so head/tail arithmetic
//! can use a bitmask instead of a modulo. A `RingBuffer` is owned by exactly
//! one framer; it is not `Sync` and carries no internal locking.

use crate::error::{ProtocolError, Result};

/// A power-of-two circular byte buffer with peek/read/remove semantics.
///
/// The buffer never reallocates after construction: writes beyond capacity
/// are a hard error rather than a grow-and-retry, matching the framer's
/// expectation that overflow signals backpressure, not a bug to paper over.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    storage: Vec<u8>,
    mask: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates a buffer whose usable capacity is the next power of two
    /// greater than or equal to `capacity_hint` (minimum 16).
    #[must_use]
    pub fn new(capacity_hint: usize) -> Self {
        let capacity = capacity_hint.max(16).next_power_of_two();
        Self { storage: vec![0u8; capacity], mask: capacity - 1, head: 0, tail: 0, len: 0 }
    }

    /// Usable capacity (always a power of two).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of bytes currently stored.
    #[must_use]
    pub fn available(&self) -> usize {
        self.len
    }

    /// Writes a single byte.
    ///
    /// # Errors
    /// Returns [`ProtocolError::RingBufferOverflow`] if the buffer is full.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.len == self.capacity() {
            return Err(ProtocolError::RingBufferOverflow { capacity: self.capacity(), attempted: 1 });
        }
        self.storage[self.tail] = byte;
        self.tail = (self.tail + 1) & self.mask;
        self.len += 1;
        Ok(())
    }

    /// Writes a full slice of bytes.
    ///
    /// Overflow is a hard error: either every byte is written, or none are
    /// (the buffer is left unchanged on error).
    ///
    /// # Errors
    /// Returns [`ProtocolError::RingBufferOverflow`] if `bytes` would not
    /// fit in the remaining capacity.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let free = self.capacity() - self.len;
        if bytes.len() > free {
            return Err(ProtocolError::RingBufferOverflow {
                capacity: self.capacity(),
                attempted: bytes.len(),
            });
        }
        for &byte in bytes {
            self.storage[self.tail] = byte;
            self.tail = (self.tail + 1) & self.mask;
        }
        self.len += bytes.len();
        Ok(())
    }

    /// Returns the byte `offset` positions from the logical front, without
    /// consuming it. `None` if `offset >= available()`.
    #[must_use]
    pub fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        Some(self.storage[(self.head + offset) & self.mask])
    }

    /// Returns a view of the contiguous prefix starting at the logical
    /// front. May be shorter than [`Self::available`] when the stored bytes
    /// wrap past the end of the backing storage — callers that need bytes
    /// past the wrap must fall back to [`Self::peek`].
    #[must_use]
    pub fn peek_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        let contiguous = self.capacity() - self.head;
        let run = contiguous.min(self.len);
        &self.storage[self.head..self.head + run]
    }

    /// Copies out `len` logical bytes starting at the front, without
    /// consuming them, handling the wrap-around case. `None` if fewer than
    /// `len` bytes are available.
    #[must_use]
    pub fn peek_copy(&self, len: usize) -> Option<Vec<u8>> {
        if len > self.len {
            return None;
        }
        let prefix = self.peek_bytes();
        if prefix.len() >= len {
            return Some(prefix[..len].to_vec());
        }
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(prefix);
        for i in prefix.len()..len {
            // SAFETY-equivalent: bounds already checked against self.len above.
            out.push(self.peek(i).unwrap_or(0));
        }
        Some(out)
    }

    /// Consumes and returns an owned copy of `n` bytes from the front.
    /// `None` if fewer than `n` bytes are available (the buffer is left
    /// unchanged in that case).
    #[must_use]
    pub fn read(&mut self, n: usize) -> Option<Vec<u8>> {
        let out = self.peek_copy(n)?;
        self.remove(n);
        Some(out)
    }

    /// Discards `n` bytes from the front. Clamps to [`Self::available`]
    /// rather than panicking on an oversized request.
    pub fn remove(&mut self, n: usize) {
        let n = n.min(self.len);
        self.head = (self.head + n) & self.mask;
        self.len -= n;
    }

    /// Discards every stored byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(RingBuffer::new(100).capacity(), 128);
        assert_eq!(RingBuffer::new(16).capacity(), 16);
        assert_eq!(RingBuffer::new(1).capacity(), 16);
    }

    #[test]
    fn write_overflow_is_rejected_and_leaves_buffer_unchanged() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1, 2, 3, 4]).unwrap();
        assert!(buf.write(&[5]).is_err());
        assert_eq!(buf.available(), 4);
    }

    #[test]
    fn read_consumes_in_fifo_order_across_wrap() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1, 2, 3]).unwrap();
        assert_eq!(buf.read(2).unwrap(), vec![1, 2]);
        // tail wraps here
        buf.write(&[4, 5]).unwrap();
        assert_eq!(buf.read(3).unwrap(), vec![3, 4, 5]);
        assert_eq!(buf.available(), 0);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[10, 20, 30]).unwrap();
        assert_eq!(buf.peek(1), Some(20));
        assert_eq!(buf.available(), 3);
    }

    #[test]
    fn clear_drops_all_bytes() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[1, 2, 3]).unwrap();
        buf.clear();
        assert_eq!(buf.available(), 0);
        assert_eq!(buf.peek(0), None);
    }

    proptest! {
        /// writes_total - reads_total - removes_total == available, at all times.
        #[test]
        fn conservation_invariant(ops in prop::collection::vec(
            prop_oneof![
                (1u8..=20).prop_map(RbOp::Write),
                (0usize..20).prop_map(RbOp::Read),
                (0usize..20).prop_map(RbOp::Remove),
            ],
            0..200,
        )) {
            let mut buf = RingBuffer::new(64);
            let mut written: usize = 0;
            let mut consumed: usize = 0;
            for op in ops {
                match op {
                    RbOp::Write(n) => {
                        let bytes = vec![0xAA; n as usize % buf.capacity().max(1)];
                        if buf.write(&bytes).is_ok() {
                            written += bytes.len();
                        }
                    }
                    RbOp::Read(n) => {
                        let n = n % (buf.capacity() + 1);
                        if let Some(out) = buf.read(n) {
                            consumed += out.len();
                        }
                    }
                    RbOp::Remove(n) => {
                        let n = n % (buf.capacity() + 1);
                        let before = buf.available();
                        buf.remove(n);
                        consumed += before - buf.available();
                    }
                }
                prop_assert_eq!(written - consumed, buf.available());
            }
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum RbOp {
        Write(u8),
        Read(usize),
        Remove(usize),
    }
}
