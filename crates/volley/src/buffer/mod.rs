//! Receive buffering for the pipelined connection driver.
//!
//! Successive socket reads arrive as independent [`Bytes`] segments. Instead
//! of forcing them into one contiguous allocation, [`RecvBuffer`] keeps them
//! in a deque and [`ByteCursor`] presents the unconsumed region as a virtual
//! contiguous byte stream: the parser can scan for delimiters and consume
//! bytes across segment boundaries without copying, and the driver releases
//! the examined prefix afterwards via [`RecvBuffer::consume`].
//!
//! The central contract is that "delimiter not found" is *not* an error: it
//! is the signal that a partial read stopped mid-line and the caller must
//! retry once more bytes arrive.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

/// A growable buffer of byte segments with single-producer/single-consumer
/// handoff semantics.
///
/// The socket fill side appends segments with [`push`](Self::push); the
/// parse side takes a [`ByteCursor`] over the unconsumed region and later
/// releases the examined prefix with [`consume`](Self::consume).
#[derive(Debug, Default)]
pub struct RecvBuffer {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl RecvBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of unconsumed bytes across all segments.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no unconsumed bytes remain.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a segment produced by a socket read.
    ///
    /// Empty segments are dropped rather than stored.
    pub fn push(&mut self, segment: Bytes) {
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push_back(segment);
    }

    /// Releases `n` consumed bytes from the front of the buffer.
    ///
    /// The prefix may span multiple segments; fully consumed segments are
    /// dropped, a partially consumed front segment is advanced in place.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len).
    pub fn consume(&mut self, mut n: usize) {
        assert!(n <= self.len, "consume past end of buffer: {n} > {}", self.len);
        self.len -= n;
        while n > 0 {
            let front = self.segments.front_mut().unwrap();
            if front.len() <= n {
                n -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(n);
                n = 0;
            }
        }
    }

    /// Returns a fresh cursor over the whole unconsumed region.
    pub fn cursor(&self) -> ByteCursor<'_> {
        ByteCursor { segments: &self.segments, seg: 0, offset: 0, position: 0, remaining: self.len }
    }
}

/// A forward-only cursor over the unconsumed region of a [`RecvBuffer`].
///
/// The cursor tracks how far it has moved ([`position`](Self::position));
/// the owning driver feeds that count back to [`RecvBuffer::consume`] once a
/// parse pass returns. Reads that cannot be satisfied by the available bytes
/// leave the cursor unmoved so the caller can retry after the next socket
/// read.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    segments: &'a VecDeque<Bytes>,
    /// Index of the segment the cursor currently points into.
    seg: usize,
    /// Offset within that segment.
    offset: usize,
    position: usize,
    remaining: usize,
}

impl ByteCursor<'_> {
    /// Bytes still ahead of the cursor.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Bytes the cursor has moved past since creation.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the byte `n` positions ahead of the cursor, if available.
    pub fn peek(&self, n: usize) -> Option<u8> {
        if n >= self.remaining {
            return None;
        }
        let mut seg = self.seg;
        let mut idx = self.offset + n;
        loop {
            let segment = &self.segments[seg];
            if idx < segment.len() {
                return Some(segment[idx]);
            }
            idx -= segment.len();
            seg += 1;
        }
    }

    /// Moves the cursor forward by `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`remaining`](Self::remaining).
    pub fn advance(&mut self, mut n: usize) {
        assert!(n <= self.remaining, "advance past end of cursor: {n} > {}", self.remaining);
        self.position += n;
        self.remaining -= n;
        while n > 0 {
            let available = self.segments[self.seg].len() - self.offset;
            if available <= n {
                n -= available;
                self.seg += 1;
                self.offset = 0;
            } else {
                self.offset += n;
                n = 0;
            }
        }
    }

    /// Scans forward for an exact byte-sequence delimiter.
    ///
    /// On a hit, returns the bytes before the delimiter and advances the
    /// cursor past it. The returned bytes are a zero-copy slice when they sit
    /// inside a single segment and a joined copy when they span a boundary.
    ///
    /// On a miss the cursor is left unmoved and `None` is returned — the
    /// delimiter may still be completed by a future socket read.
    pub fn try_read_until(&mut self, delim: &[u8]) -> Option<Bytes> {
        let at = self.find(delim)?;
        let head = self.slice_ahead(at);
        self.advance(at + delim.len());
        Some(head)
    }

    /// Copies up to `n` bytes ahead of the cursor into `dst`, advancing the
    /// cursor, and returns how many bytes were taken.
    pub fn copy_to(&mut self, dst: &mut BytesMut, n: usize) -> usize {
        let take = n.min(self.remaining);
        if take > 0 {
            dst.extend_from_slice(&self.slice_ahead(take));
            self.advance(take);
        }
        take
    }

    /// Discards up to `n` bytes ahead of the cursor and returns how many
    /// bytes were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let take = n.min(self.remaining);
        self.advance(take);
        take
    }

    /// Finds the start of `delim` relative to the cursor, walking bytes
    /// across segment boundaries with a rolling window.
    fn find(&self, delim: &[u8]) -> Option<usize> {
        debug_assert!(!delim.is_empty());
        if self.remaining < delim.len() {
            return None;
        }

        let mut window: VecDeque<u8> = VecDeque::with_capacity(delim.len());
        let mut walked = 0usize;

        let mut seg = self.seg;
        let mut offset = self.offset;
        while walked < self.remaining {
            let segment = &self.segments[seg];
            for &byte in &segment[offset..] {
                window.push_back(byte);
                if window.len() > delim.len() {
                    window.pop_front();
                }
                walked += 1;
                if window.len() == delim.len() && window.iter().eq(delim.iter()) {
                    return Some(walked - delim.len());
                }
            }
            seg += 1;
            offset = 0;
        }

        None
    }

    /// Returns the `n` bytes ahead of the cursor without advancing.
    ///
    /// Zero-copy when the range lies within the current segment.
    fn slice_ahead(&self, n: usize) -> Bytes {
        debug_assert!(n <= self.remaining);
        if n == 0 {
            return Bytes::new();
        }

        let first = &self.segments[self.seg];
        if self.offset + n <= first.len() {
            return first.slice(self.offset..self.offset + n);
        }

        // spans a segment boundary, join into one allocation
        let mut joined = BytesMut::with_capacity(n);
        let mut left = n;
        let mut seg = self.seg;
        let mut offset = self.offset;
        while left > 0 {
            let segment = &self.segments[seg];
            let take = left.min(segment.len() - offset);
            joined.extend_from_slice(&segment[offset..offset + take]);
            left -= take;
            seg += 1;
            offset = 0;
        }
        joined.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(parts: &[&[u8]]) -> RecvBuffer {
        let mut buffer = RecvBuffer::new();
        for part in parts {
            buffer.push(Bytes::copy_from_slice(part));
        }
        buffer
    }

    #[test]
    fn read_until_within_one_segment() {
        let buffer = buffer_of(&[b"HTTP/1.1 200 OK\r\nmore"]);
        let mut cursor = buffer.cursor();

        let line = cursor.try_read_until(b"\r\n").unwrap();
        assert_eq!(&line[..], b"HTTP/1.1 200 OK");
        assert_eq!(cursor.position(), 17);
        assert_eq!(cursor.remaining(), 4);
    }

    #[test]
    fn read_until_spanning_segments() {
        let buffer = buffer_of(&[b"HTTP/1.1 2", b"00 OK\r", b"\nrest"]);
        let mut cursor = buffer.cursor();

        let line = cursor.try_read_until(b"\r\n").unwrap();
        assert_eq!(&line[..], b"HTTP/1.1 200 OK");
        assert_eq!(cursor.remaining(), 4);
    }

    #[test]
    fn read_until_missing_delimiter_leaves_cursor_unmoved() {
        let buffer = buffer_of(&[b"HTTP/1.1 200", b" OK"]);
        let mut cursor = buffer.cursor();

        assert!(cursor.try_read_until(b"\r\n").is_none());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.remaining(), 15);
    }

    #[test]
    fn read_until_delimiter_split_at_every_boundary() {
        let data = b"abc\r\ndef";
        for split in 0..data.len() {
            let buffer = buffer_of(&[&data[..split], &data[split..]]);
            let mut cursor = buffer.cursor();
            let line = cursor.try_read_until(b"\r\n").unwrap();
            assert_eq!(&line[..], b"abc", "split at {split}");
            assert_eq!(cursor.position(), 5, "split at {split}");
        }
    }

    #[test]
    fn read_until_repeated_prefix_delimiter() {
        // delimiter with a repeated prefix must not be missed by the scan
        let buffer = buffer_of(&[b"xa", b"aab-rest"]);
        let mut cursor = buffer.cursor();
        let head = cursor.try_read_until(b"aab").unwrap();
        assert_eq!(&head[..], b"x");
        assert_eq!(cursor.remaining(), 5);
    }

    #[test]
    fn peek_and_advance_across_segments() {
        let buffer = buffer_of(&[b"ab", b"cd"]);
        let mut cursor = buffer.cursor();

        assert_eq!(cursor.peek(0), Some(b'a'));
        assert_eq!(cursor.peek(3), Some(b'd'));
        assert_eq!(cursor.peek(4), None);

        cursor.advance(3);
        assert_eq!(cursor.peek(0), Some(b'd'));
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn copy_to_is_capped_by_available_bytes() {
        let buffer = buffer_of(&[b"hel", b"lo"]);
        let mut cursor = buffer.cursor();

        let mut out = BytesMut::new();
        assert_eq!(cursor.copy_to(&mut out, 100), 5);
        assert_eq!(&out[..], b"hello");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn consume_releases_prefix_across_segments() {
        let mut buffer = buffer_of(&[b"abc", b"def", b"ghi"]);
        buffer.consume(4);

        assert_eq!(buffer.len(), 5);
        let mut cursor = buffer.cursor();
        assert_eq!(cursor.peek(0), Some(b'e'));
        let rest = cursor.try_read_until(b"i").unwrap();
        assert_eq!(&rest[..], b"efgh");
    }

    #[test]
    fn empty_segments_are_dropped() {
        let mut buffer = RecvBuffer::new();
        buffer.push(Bytes::new());
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic(expected = "consume past end")]
    fn consume_past_end_panics() {
        let mut buffer = buffer_of(&[b"ab"]);
        buffer.consume(3);
    }
}
