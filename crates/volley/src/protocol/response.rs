/// The parser's position within a single HTTP/1.1 response.
///
/// The state drives which parsing branch executes on the next buffer
/// delivery. `Completed` and `Error` are terminal: once reached, no further
/// bytes are examined for this response until [`Response::reset`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Waiting for (or mid-way through) the status line
    #[default]
    StartLine,
    /// Reading header lines up to the terminating blank line
    Headers,
    /// Consuming a fixed Content-Length body
    Body,
    /// Consuming a chunked transfer encoded body
    ChunkedBody,
    /// Full response parsed
    Completed,
    /// Malformed protocol data, response abandoned
    Error,
}

impl ParseState {
    /// Returns true for the terminal states `Completed` and `Error`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParseState::Completed | ParseState::Error)
    }
}

/// Position within the chunked-body framing, tracked separately from
/// [`ParseState`] so a parse pass can stop between a chunk-size line, its
/// data, and the CRLFs without losing progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum ChunkPhase {
    /// Expecting a chunk-size line
    #[default]
    Size,
    /// Mid-chunk, `chunk_remaining` data bytes left
    Data,
    /// Expecting the CRLF after chunk data
    DataCrlf,
    /// Expecting the CRLF after the terminating zero-size chunk
    EndCrlf,
}

/// One pipeline slot's parsed response.
///
/// A `Response` is a pure data holder: the parsing logic lives in
/// [`codec::advance`](crate::codec::advance), which mutates the record in
/// place as bytes arrive. One instance exists per pipeline slot and is
/// [`reset`](Self::reset) before every send/receive cycle, so sustained load
/// never allocates per request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    state: ParseState,
    /// Parsed status code, 0 until the status line is parsed
    status_code: u16,
    /// Declared (fixed body) or accumulated (chunked body) length
    content_length: u64,
    /// Bytes still expected in a fixed-length body
    content_length_remaining: u64,
    /// Chooses the Body branch over ChunkedBody when headers end
    has_content_length: bool,
    /// Bytes still expected in the current chunk (chunked mode only)
    chunk_remaining: u64,
    /// Position within the chunked framing (chunked mode only)
    chunk_phase: ChunkPhase,
}

impl Response {
    /// Creates a slot in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores all fields to their initial-construction values for reuse.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current parse state.
    #[inline]
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Parsed status code; 0 until the status line has been parsed.
    #[inline]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Declared body length for fixed bodies, accumulated length for
    /// chunked bodies.
    #[inline]
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Bytes still expected in a fixed-length body.
    #[inline]
    pub fn content_length_remaining(&self) -> u64 {
        self.content_length_remaining
    }

    /// Returns true once the full response has been parsed.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Completed
    }

    /// Returns true if no further bytes will be examined for this response.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Status class digit (1 for 1xx .. 5 for 5xx), or `None` for anything
    /// outside the defined classes.
    pub fn status_class(&self) -> Option<u8> {
        match self.status_code {
            100..=599 => Some((self.status_code / 100) as u8),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: ParseState) {
        self.state = state;
    }

    pub(crate) fn set_status_code(&mut self, code: u16) {
        self.status_code = code;
    }

    pub(crate) fn set_content_length(&mut self, length: u64) {
        self.has_content_length = true;
        self.content_length = length;
        self.content_length_remaining = length;
    }

    pub(crate) fn has_content_length(&self) -> bool {
        self.has_content_length
    }

    pub(crate) fn consume_body(&mut self, n: u64) {
        debug_assert!(n <= self.content_length_remaining);
        self.content_length_remaining -= n;
    }

    pub(crate) fn begin_chunk(&mut self, size: u64) {
        self.content_length = self.content_length.saturating_add(size);
        self.chunk_remaining = size;
    }

    pub(crate) fn chunk_phase(&self) -> ChunkPhase {
        self.chunk_phase
    }

    pub(crate) fn set_chunk_phase(&mut self, phase: ChunkPhase) {
        self.chunk_phase = phase;
    }

    pub(crate) fn chunk_remaining(&self) -> u64 {
        self.chunk_remaining
    }

    pub(crate) fn consume_chunk(&mut self, n: u64) {
        debug_assert!(n <= self.chunk_remaining);
        self.chunk_remaining -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_starts_at_start_line() {
        let response = Response::new();
        assert_eq!(response.state(), ParseState::StartLine);
        assert_eq!(response.status_code(), 0);
        assert_eq!(response.content_length(), 0);
        assert!(!response.is_terminal());
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut response = Response::new();
        response.set_status_code(200);
        response.set_content_length(42);
        response.consume_body(42);
        response.begin_chunk(7);
        response.set_state(ParseState::Completed);

        response.reset();
        assert_eq!(response, Response::new());
    }

    #[test]
    fn status_class_covers_defined_classes_only() {
        let mut response = Response::new();

        response.set_status_code(101);
        assert_eq!(response.status_class(), Some(1));
        response.set_status_code(204);
        assert_eq!(response.status_class(), Some(2));
        response.set_status_code(503);
        assert_eq!(response.status_class(), Some(5));

        response.set_status_code(0);
        assert_eq!(response.status_class(), None);
        response.set_status_code(999);
        assert_eq!(response.status_class(), None);
    }

    #[test]
    fn terminal_states() {
        assert!(ParseState::Completed.is_terminal());
        assert!(ParseState::Error.is_terminal());
        assert!(!ParseState::Headers.is_terminal());
    }
}
