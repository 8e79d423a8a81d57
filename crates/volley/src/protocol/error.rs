use std::io;
use thiserror::Error;

/// Protocol-level parse failures.
///
/// These are terminal for the response they occur on: the parser records
/// them by moving the response into [`ParseState::Error`] and the driver
/// stops feeding that slot. They are never thrown across the connection
/// API — only transport problems are.
///
/// [`ParseState::Error`]: crate::protocol::ParseState::Error
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid status line: {reason}")]
    InvalidStatusLine { reason: String },

    #[error("unsupported http version: {0}")]
    InvalidVersion(String),

    #[error("invalid status code: {reason}")]
    InvalidStatusCode { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },
}

impl ParseError {
    pub fn invalid_status_line<S: ToString>(str: S) -> Self {
        Self::InvalidStatusLine { reason: str.to_string() }
    }

    pub fn invalid_status_code<S: ToString>(str: S) -> Self {
        Self::InvalidStatusCode { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }
}

/// Transport-level connection failures.
///
/// Unlike [`ParseError`], these propagate as `Err` from connect/send and the
/// calling worker counts them as a connection failure and opens a fresh
/// connection.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("invalid target url: {reason}")]
    InvalidTarget { reason: String },

    #[error("could not resolve host {host}")]
    Resolve { host: String },

    #[error("tls error: {source}")]
    Tls {
        #[from]
        source: rustls::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ConnectError {
    pub fn invalid_target<S: ToString>(str: S) -> Self {
        Self::InvalidTarget { reason: str.to_string() }
    }

    pub fn resolve<S: ToString>(host: S) -> Self {
        Self::Resolve { host: host.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
