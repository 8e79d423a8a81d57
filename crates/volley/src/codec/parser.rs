//! The response parser state machine.
//!
//! One call to [`advance`] drives a [`Response`] as far as the bytes under
//! the cursor allow, falling through between states in a single pass: a
//! status line followed by complete headers and body bytes in the same
//! buffer is parsed to `Completed` without returning to the driver in
//! between.
//!
//! Two failure modes are kept strictly apart:
//!
//! - **Insufficient data** is not an error. The parser returns with the
//!   state preserved and the caller retries once more bytes arrive.
//! - **Malformed protocol data** (bad version token, unparsable numbers, a
//!   header without a colon, a mismatched CRLF) moves the response into the
//!   terminal [`ParseState::Error`]. There is no recovery path; the driver
//!   abandons the connection.

use std::cmp;

use tracing::{debug, trace};

use crate::buffer::ByteCursor;
use crate::ensure;
use crate::protocol::{ChunkPhase, ParseError, ParseState, Response};

const CRLF: &[u8] = b"\r\n";
const HTTP_VERSION: &[u8] = b"HTTP/1.1";
const CONTENT_LENGTH: &[u8] = b"Content-Length";

/// Advances `response` over the bytes under `cursor` and returns how many
/// bytes were examined.
///
/// Examined bytes are definitively consumed: the owning buffer can release
/// them. A terminal response examines nothing, even if more bytes are
/// buffered — the driver moves on to the next pipeline slot.
pub fn advance(response: &mut Response, cursor: &mut ByteCursor<'_>) -> usize {
    if response.is_terminal() {
        return 0;
    }

    if let Err(e) = run(response, cursor) {
        debug!(error = %e, state = ?response.state(), "protocol error, abandoning response");
        response.set_state(ParseState::Error);
    }

    cursor.position()
}

/// The state-transition loop. `Ok(())` means either completion or
/// out-of-data; the distinction is carried by `response.state()`.
fn run(response: &mut Response, cursor: &mut ByteCursor<'_>) -> Result<(), ParseError> {
    loop {
        match response.state() {
            ParseState::StartLine => {
                let Some(line) = cursor.try_read_until(CRLF) else {
                    return Ok(());
                };
                parse_status_line(&line, response)?;
                trace!(status = response.status_code(), "parsed status line");
                response.set_state(ParseState::Headers);
            }

            ParseState::Headers => {
                let Some(line) = cursor.try_read_until(CRLF) else {
                    return Ok(());
                };
                if line.is_empty() {
                    // blank line ends the header section; a response without
                    // an explicit length is assumed chunked
                    let next = if response.has_content_length() {
                        ParseState::Body
                    } else {
                        ParseState::ChunkedBody
                    };
                    response.set_state(next);
                } else {
                    parse_header_line(&line, response)?;
                }
            }

            ParseState::Body => {
                let take = cmp::min(cursor.remaining() as u64, response.content_length_remaining());
                cursor.skip(take as usize);
                response.consume_body(take);

                if response.content_length_remaining() == 0 {
                    response.set_state(ParseState::Completed);
                } else {
                    return Ok(());
                }
            }

            ParseState::ChunkedBody => match response.chunk_phase() {
                ChunkPhase::Size => {
                    let Some(line) = cursor.try_read_until(CRLF) else {
                        return Ok(());
                    };
                    let size = parse_chunk_size(&line)?;
                    trace!(size, "parsed chunk size");
                    response.begin_chunk(size);
                    let phase = if size == 0 { ChunkPhase::EndCrlf } else { ChunkPhase::Data };
                    response.set_chunk_phase(phase);
                }

                ChunkPhase::Data => {
                    let take = cmp::min(cursor.remaining() as u64, response.chunk_remaining());
                    cursor.skip(take as usize);
                    response.consume_chunk(take);

                    if response.chunk_remaining() == 0 {
                        response.set_chunk_phase(ChunkPhase::DataCrlf);
                    } else {
                        return Ok(());
                    }
                }

                ChunkPhase::DataCrlf => {
                    if !expect_crlf(cursor)? {
                        return Ok(());
                    }
                    response.set_chunk_phase(ChunkPhase::Size);
                }

                ChunkPhase::EndCrlf => {
                    if !expect_crlf(cursor)? {
                        return Ok(());
                    }
                    response.set_state(ParseState::Completed);
                }
            },

            ParseState::Completed | ParseState::Error => return Ok(()),
        }
    }
}

/// Parses `HTTP/1.1 <code> [reason]`. The version token must match the
/// literal exactly; the reason phrase is ignored.
fn parse_status_line(line: &[u8], response: &mut Response) -> Result<(), ParseError> {
    let space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ParseError::invalid_status_line("missing space after version"))?;

    let (version, rest) = line.split_at(space);
    ensure!(version == HTTP_VERSION, ParseError::InvalidVersion(String::from_utf8_lossy(version).into_owned()));

    let rest = &rest[1..];
    let code = match rest.iter().position(|&b| b == b' ') {
        Some(space) => &rest[..space],
        // a bare "HTTP/1.1 200" with no reason phrase is acceptable
        None => rest,
    };

    let code = std::str::from_utf8(code)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| ParseError::invalid_status_code(String::from_utf8_lossy(code)))?;

    response.set_status_code(code);
    Ok(())
}

/// Parses one `Name: value` header line. Only `Content-Length` is
/// interpreted (case-insensitively); every other header is validated for
/// the colon and discarded.
fn parse_header_line(line: &[u8], response: &mut Response) -> Result<(), ParseError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| ParseError::invalid_header(String::from_utf8_lossy(line)))?;

    let (name, value) = line.split_at(colon);
    if !name.eq_ignore_ascii_case(CONTENT_LENGTH) {
        return Ok(());
    }

    let value = std::str::from_utf8(&value[1..])
        .map_err(|_| ParseError::invalid_content_length("value is not utf-8"))?;

    let length = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::invalid_content_length(format!("value {value} is not u64")))?;

    response.set_content_length(length);
    Ok(())
}

/// Parses a chunk-size line as a hexadecimal integer.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let str = std::str::from_utf8(line).map_err(|_| ParseError::invalid_chunk("size line is not utf-8"))?;
    u64::from_str_radix(str.trim(), 16).map_err(|_| ParseError::invalid_chunk(format!("size {str} is not hex")))
}

/// Consumes a mandatory CRLF. Returns `Ok(false)` when fewer than two bytes
/// are available (wait for more data), errors when the bytes present are
/// anything else.
fn expect_crlf(cursor: &mut ByteCursor<'_>) -> Result<bool, ParseError> {
    if cursor.remaining() < 2 {
        return Ok(false);
    }
    let (cr, lf) = (cursor.peek(0), cursor.peek(1));
    ensure!(cr == Some(b'\r') && lf == Some(b'\n'), ParseError::invalid_chunk("missing CRLF after chunk"));
    cursor.advance(2);
    Ok(true)
}
