//! Connection handling for pipelined request batches.
//!
//! This module owns everything between a target URL and a drained batch of
//! responses:
//!
//! - [`Target`]: scheme/host/port/path, parsed once per connection
//! - request-block construction: `pipeline_depth` pre-encoded GET requests
//! - [`Connection`]: socket lifecycle, the background fill task, and the
//!   `send_requests` drain loop
//! - [`InsecureCertVerifier`]: the deliberately trust-everything TLS
//!   verifier used for https targets

mod conn;
pub use conn::Connection;

mod target;
pub use target::Scheme;
pub use target::Target;

mod tls;
pub use tls::InsecureCertVerifier;
