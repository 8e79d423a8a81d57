//! The pipelined connection driver.
//!
//! A [`Connection`] owns one socket (plain TCP or TLS), the pre-encoded
//! request block, and one [`Response`] slot per pipeline position. After
//! [`connect`](Connection::connect), a background fill task continuously
//! reads whatever the socket yields into segments and hands them to the
//! driver over a channel, independent of when the parser consumes them.
//! [`send_requests`](Connection::send_requests) writes the whole batch in
//! one flush and then drains the expected responses in order.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

use crate::buffer::RecvBuffer;
use crate::codec;
use crate::connection::target::{Target, build_request_block};
use crate::connection::tls::insecure_client_config;
use crate::protocol::{ConnectError, Response};

/// Capacity reserved per socket read.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Object-safe alias for the two stream flavors (TCP, TLS-over-TCP).
trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

type BoxedStream = Box<dyn IoStream>;

/// The live half of a connection: everything that exists only between
/// `connect` and close.
struct Live {
    writer: WriteHalf<BoxedStream>,
    segments: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    fill_task: JoinHandle<()>,
    buffer: RecvBuffer,
}

/// A pipelined HTTP/1.1 connection.
///
/// The request block and the response slots are built once at construction
/// and reused by every [`send_requests`](Self::send_requests) call; a
/// connection episode allocates nothing on the per-batch path.
///
/// Usage is strictly sequential: `connect`, then `send_requests` calls one
/// at a time. A connection is not meant to be reused after an error or
/// stream closure — the surrounding worker opens a fresh one.
pub struct Connection {
    target: Target,
    request_block: Bytes,
    responses: Vec<Response>,
    live: Option<Live>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("pipeline_depth", &self.responses.len())
            .field("connected", &self.live.is_some())
            .finish()
    }
}

impl Connection {
    /// Creates a connection for `url` with `pipeline_depth` requests per
    /// batch and the given extra header lines (each `"Name: value"`).
    ///
    /// The target is parsed and the request block encoded here, once.
    pub fn new(url: &str, pipeline_depth: usize, headers: &[String]) -> Result<Self, ConnectError> {
        assert!(pipeline_depth > 0, "pipeline depth must be positive");
        let target = Target::parse(url)?;
        let request_block = build_request_block(&target, headers, pipeline_depth);
        let responses = vec![Response::new(); pipeline_depth];
        Ok(Self { target, request_block, responses, live: None })
    }

    /// The parsed target this connection was built for.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Number of requests per batch.
    pub fn pipeline_depth(&self) -> usize {
        self.responses.len()
    }

    /// Resolves the target, opens the socket (with TLS handshake for https
    /// targets) and starts the background fill task.
    ///
    /// Calling `connect` on an already-connected instance is a no-op.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.live.is_some() {
            return Ok(());
        }

        let addr = tokio::net::lookup_host((self.target.host(), self.target.port()))
            .await
            .map_err(|_| ConnectError::resolve(self.target.host()))?
            .next()
            .ok_or_else(|| ConnectError::resolve(self.target.host()))?;

        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(true)?;
        trace!(%addr, "tcp connected");

        let stream: BoxedStream = if self.target.is_tls() {
            let connector = TlsConnector::from(std::sync::Arc::new(insecure_client_config()?));
            let server_name = rustls::pki_types::ServerName::try_from(self.target.host().to_string())
                .map_err(|e| ConnectError::invalid_target(format!("bad tls server name: {e}")))?;
            Box::new(connector.connect(server_name, tcp).await?)
        } else {
            Box::new(tcp)
        };

        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let fill_task = tokio::spawn(fill(reader, tx));

        self.live = Some(Live { writer, segments: rx, fill_task, buffer: RecvBuffer::new() });
        Ok(())
    }

    /// Writes the pre-encoded request batch and drains the expected
    /// responses in order.
    ///
    /// Every slot is reset first, then each is fed buffered bytes until it
    /// reaches a terminal state. When the stream ends (or a slot hits a
    /// protocol error) before all slots complete, processing stops early
    /// and the untouched slots keep their reset state.
    ///
    /// Returns the same slot array on every call, mutated in place; callers
    /// treat any non-`Completed` slot as a failure. Transport errors
    /// surface as `Err`.
    pub async fn send_requests(&mut self) -> Result<&[Response], ConnectError> {
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| ConnectError::io(io::Error::new(io::ErrorKind::NotConnected, "connect first")))?;

        live.writer.write_all(&self.request_block).await?;
        live.writer.flush().await?;

        for response in &mut self.responses {
            response.reset();
        }

        'slots: for slot in 0..self.responses.len() {
            loop {
                let response = &mut self.responses[slot];
                let mut cursor = live.buffer.cursor();
                let examined = codec::advance(response, &mut cursor);
                live.buffer.consume(examined);

                if response.is_terminal() {
                    break;
                }

                // parser needs more data than the buffer holds
                match live.segments.recv().await {
                    Some(Ok(segment)) => live.buffer.push(segment),
                    Some(Err(e)) => return Err(ConnectError::io(e)),
                    None => {
                        debug!(slot, "stream ended before batch completed");
                        break 'slots;
                    }
                }
            }

            if !self.responses[slot].is_complete() {
                debug!(slot, "response ended in error, abandoning batch");
                break 'slots;
            }
        }

        Ok(&self.responses)
    }

    /// Shuts the connection down: aborts the fill task and drops the
    /// stream. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(live) = self.live.take() {
            live.fill_task.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// The background fill loop: reads available bytes into fresh segments and
/// hands them over until the peer closes, the socket fails, or the driver
/// goes away.
async fn fill(mut reader: ReadHalf<BoxedStream>, tx: mpsc::UnboundedSender<io::Result<Bytes>>) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        buf.reserve(READ_CHUNK_SIZE);
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                trace!("peer closed the stream");
                return;
            }
            Ok(n) => {
                trace!(len = n, "filled segment");
                if tx.send(Ok(buf.split().freeze())).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "read failed, ending fill");
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}
