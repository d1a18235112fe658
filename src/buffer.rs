//! Rolling receive buffer for partial frames

use crate::{
    constants::{MAX_BUFFER_SIZE, READ_CHUNK},
    error::{AmiError, AmiResult},
};

/// Bytes received from the socket that do not yet form a complete frame.
///
/// Consumed bytes are tracked with a read offset and reclaimed by
/// [`compact`](Self::compact), so extracting a frame never shifts the
/// remaining data more than once. A failed search remembers how far it
/// got, so a frame arriving in many reads is scanned once overall.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    position: usize,
    /// Pending bytes already searched for `scanned_pattern` without a match.
    scanned: usize,
    scanned_pattern: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(READ_CHUNK),
            position: 0,
            scanned: 0,
            scanned_pattern: Vec::new(),
        }
    }

    /// Append freshly read bytes
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data
            .extend_from_slice(bytes);
    }

    /// Unconsumed bytes
    pub fn pending(&self) -> &[u8] {
        &self.data[self.position..]
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail once the unconsumed data exceeds [`MAX_BUFFER_SIZE`].
    pub fn check_size_limits(&self) -> AmiResult<()> {
        let size = self.len();
        if size > MAX_BUFFER_SIZE {
            return Err(AmiError::BufferOverflow {
                size,
                limit: MAX_BUFFER_SIZE,
            });
        }
        Ok(())
    }

    /// Remove and return everything before the first `pattern`.
    ///
    /// The pattern itself is consumed and not returned. Returns `None`,
    /// leaving the buffer untouched, when the pattern is not present.
    pub fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        if self.scanned_pattern != pattern {
            self.scanned_pattern
                .clear();
            self.scanned_pattern
                .extend_from_slice(pattern);
            self.scanned = 0;
        }

        // Back up far enough to catch a match straddling the previous end.
        let from = self
            .scanned
            .saturating_sub(pattern.len().saturating_sub(1));
        let Some(offset) = find_subsequence(&self.pending()[from..], pattern) else {
            self.scanned = self.len();
            return None;
        };

        let start = self.position;
        let end = start + from + offset;
        let extracted = self.data[start..end].to_vec();
        self.position = end + pattern.len();
        self.scanned = 0;
        Some(extracted)
    }

    /// Drop consumed bytes from the front of the buffer
    pub fn compact(&mut self) {
        if self.position == 0 {
            return;
        }
        self.data
            .drain(..self.position);
        self.position = 0;
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
