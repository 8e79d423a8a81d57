//! Incremental HTTP/1.1 response parsing.
//!
//! The codec consumes bytes from a [`ByteCursor`] and advances a
//! [`Response`] state machine in place. It is built for pipelined streams:
//! responses arrive concatenated, bytes arrive in arbitrary slices, and the
//! parser must make as much progress as the available bytes allow and pick
//! up exactly where it left off on the next call.
//!
//! [`ByteCursor`]: crate::buffer::ByteCursor
//! [`Response`]: crate::protocol::Response

mod parser;
pub use parser::advance;
