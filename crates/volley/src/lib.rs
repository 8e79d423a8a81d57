//! A pipelined HTTP/1.1 load-generation core
//!
//! This crate provides the hot path of an HTTP benchmarking client: it writes
//! batches of identical GET requests back-to-back onto a single TCP or TLS
//! connection ("pipelining") and incrementally parses the stream of
//! concatenated responses as bytes arrive, without ever buffering a full
//! message.
//!
//! # Features
//!
//! - Incremental, re-entrant HTTP/1.1 response parsing
//! - Chunked transfer decoding and fixed Content-Length bodies
//! - Zero-copy receive buffering across discontiguous socket reads
//! - Pre-encoded pipelined request batches built once per connection
//! - TLS with an explicit trust-everything verifier (benchmarking only)
//! - Allocation-free response slots reused across batches
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use volley::worker::{self, WorkerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let opts = WorkerOptions {
//!         url: "http://127.0.0.1:8080/".to_string(),
//!         pipeline_depth: 16,
//!         headers: vec![],
//!     };
//!
//!     let token = CancellationToken::new();
//!     let handle = tokio::spawn(worker::run_worker(opts, token.clone()));
//!
//!     tokio::time::sleep(Duration::from_secs(10)).await;
//!     token.cancel();
//!
//!     let stats = handle.await.unwrap();
//!     println!("{} responses, {} errors", stats.responses(), stats.errors());
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`buffer`]: Receive buffer and cursor over discontiguous byte segments
//! - [`protocol`]: Response model and error types
//! - [`codec`]: The incremental response parser state machine
//! - [`connection`]: Pipelined connection driver (TCP/TLS, request batches)
//! - [`worker`]: Per-connection load loop and statistics
//!
//! # Data flow
//!
//! The [`connection::Connection`] driver writes the prebuilt request block,
//! then a background task appends whatever the socket yields to a
//! [`buffer::RecvBuffer`]. For each pipeline slot in order, the driver hands
//! the unconsumed region to [`codec::advance`] as a [`buffer::ByteCursor`];
//! the parser moves the slot's [`protocol::Response`] state forward as far as
//! the available bytes allow and reports how much it examined, which the
//! driver releases from the buffer before looping.
//!
//! # Safety
//!
//! Certificate validation is intentionally disabled for https targets: this
//! is a load generator, not a security-sensitive HTTP client. The verifier is
//! named [`connection::InsecureCertVerifier`] so the choice cannot be
//! mistaken for production-safe behavior.

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod protocol;
pub mod worker;

mod utils;
pub(crate) use utils::ensure;
