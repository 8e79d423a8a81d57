//! Core protocol types for the response side of the pipeline.
//!
//! This module holds the data model shared between the parser and the
//! connection driver:
//!
//! - [`Response`]: a reusable, resettable record for one pipeline slot,
//!   holding the parse state and content-length bookkeeping
//! - [`ParseState`]: the parser's position within a response
//! - [`ParseError`]: protocol-level failures, recorded as the terminal
//!   [`ParseState::Error`] on the owning response
//! - [`ConnectError`]: transport-level failures (DNS, TCP, TLS, I/O),
//!   surfaced as `Err` from the connection driver

mod response;
pub use response::Response;
pub use response::ParseState;
pub(crate) use response::ChunkPhase;

mod error;
pub use error::ConnectError;
pub use error::ParseError;
