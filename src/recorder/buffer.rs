//! Append-only segmented byte buffer for recorded media.
//!
//! Unlike a ring buffer, nothing is ever overwritten: an interview recording
//! must be complete from the first byte.  Bytes are packed into fixed-size
//! segments so the buffer grows one segment at a time instead of
//! re-allocating one huge vector.
//!
//! # Example
//!
//! ```rust
//! use mock_interview::recorder::SegmentBuffer;
//!
//! let mut buf = SegmentBuffer::new(4);
//! buf.push_slice(b"hello");           // 5 bytes → two segments
//! assert_eq!(buf.segment_count(), 2);
//! assert_eq!(buf.concat(), b"hello".to_vec());
//! ```

// ---------------------------------------------------------------------------
// SegmentBuffer
// ---------------------------------------------------------------------------

pub struct SegmentBuffer {
    segments: Vec<Vec<u8>>,
    segment_size: usize,
    /// Total bytes stored across all segments.
    len: usize,
}

impl SegmentBuffer {
    /// Create an empty buffer whose segments hold `segment_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `segment_size == 0`.
    pub fn new(segment_size: usize) -> Self {
        assert!(segment_size > 0, "SegmentBuffer segment size must be > 0");
        Self {
            segments: Vec::new(),
            segment_size,
            len: 0,
        }
    }

    /// Append `data`, filling the last segment before opening a new one.
    pub fn push_slice(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let needs_segment = self
                .segments
                .last()
                .map_or(true, |s| s.len() == self.segment_size);
            if needs_segment {
                self.segments.push(Vec::with_capacity(self.segment_size));
            }
            let Some(tail) = self.segments.last_mut() else {
                break;
            };
            let room = self.segment_size - tail.len();
            let take = room.min(data.len());
            tail.extend_from_slice(&data[..take]);
            self.len += take;
            data = &data[take..];
        }
    }

    /// All bytes in order, as one contiguous artifact.  The buffer is left
    /// intact.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }

    /// Like [`concat`](Self::concat) but hands over the bytes and empties
    /// the buffer.
    pub fn drain(&mut self) -> Vec<u8> {
        let out = self.concat();
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
