//! Target URL parsing and request-block construction.
//!
//! The target is parsed once per connection and the full pipelined request
//! batch is pre-encoded at the same time: `pipeline_depth` identical GET
//! requests concatenated into one immutable buffer, written in a single
//! syscall by every `send_requests` call.

use bytes::{Bytes, BytesMut};
use http::Uri;

use crate::ensure;
use crate::protocol::ConnectError;

/// URL scheme of the target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// A parsed target: everything the driver needs to open a socket and build
/// the request line.
#[derive(Debug, Clone)]
pub struct Target {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Path plus query, as sent on the request line
    path: String,
}

impl Target {
    /// Parses a target URL. The scheme must be `http` or `https`; the port
    /// defaults to 80/443 accordingly.
    pub fn parse(url: &str) -> Result<Self, ConnectError> {
        let uri: Uri = url.parse().map_err(|e| ConnectError::invalid_target(format!("{url}: {e}")))?;

        let scheme = match uri.scheme_str() {
            Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            other => {
                return Err(ConnectError::invalid_target(format!("unsupported scheme {other:?}")));
            }
        };

        let host = uri.host().ok_or_else(|| ConnectError::invalid_target("missing host"))?.to_string();
        ensure!(!host.is_empty(), ConnectError::invalid_target("missing host"));

        let port = uri.port_u16().unwrap_or(match scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        });

        let mut path = uri.path_and_query().map_or_else(String::new, |pq| pq.as_str().to_string());
        if path.is_empty() {
            path.push('/');
        }

        Ok(Self { scheme, host, port, path })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value for the auto-added `Host` header: the port is omitted when it
    /// is the scheme default.
    pub fn host_header(&self) -> String {
        let default_port = match self.scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        };
        if self.port == default_port { self.host.clone() } else { format!("{}:{}", self.host, self.port) }
    }
}

/// Builds the pipelined request block: one GET request — request line,
/// `Host` header (only when not supplied by `headers`), the extra header
/// lines verbatim, blank line — repeated `pipeline_depth` times.
pub(crate) fn build_request_block(target: &Target, headers: &[String], pipeline_depth: usize) -> Bytes {
    let mut request = BytesMut::new();
    request.extend_from_slice(b"GET ");
    request.extend_from_slice(target.path().as_bytes());
    request.extend_from_slice(b" HTTP/1.1\r\n");

    let has_host = headers.iter().any(|line| {
        line.split(':').next().is_some_and(|name| name.trim().eq_ignore_ascii_case("host"))
    });
    if !has_host {
        request.extend_from_slice(b"Host: ");
        request.extend_from_slice(target.host_header().as_bytes());
        request.extend_from_slice(b"\r\n");
    }

    for line in headers {
        request.extend_from_slice(line.as_bytes());
        request.extend_from_slice(b"\r\n");
    }
    request.extend_from_slice(b"\r\n");

    let mut block = BytesMut::with_capacity(request.len() * pipeline_depth);
    for _ in 0..pipeline_depth {
        block.extend_from_slice(&request);
    }
    block.freeze()
}
