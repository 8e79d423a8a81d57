//! The per-connection load loop and its statistics.
//!
//! One worker drives one connection at a time: open, connect, fire a
//! pipelined batch, tally the slots, and rotate to a fresh connection.
//! Many workers run concurrently, each with a private [`WorkerStats`];
//! the stats are merged only after all workers finish, so the hot path
//! shares nothing.
//!
//! Cancellation is cooperative and coarse: the token is checked between
//! batches only, so an in-flight batch is always allowed to finish.

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::connection::Connection;
use crate::protocol::Response;

/// Configuration for one worker. Cheap to clone, one copy per worker task.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Target URL (http or https)
    pub url: String,
    /// Requests per batch on each connection
    pub pipeline_depth: usize,
    /// Extra raw header lines, each `"Name: value"`
    pub headers: Vec<String>,
}

/// Per-worker tallies, merged across workers after the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Completed responses by status class, `[0]` = 1xx .. `[4]` = 5xx
    status_classes: [u64; 5],
    /// Slots that ended in a protocol error, an unclassifiable status, or
    /// were cut off by stream closure
    response_errors: u64,
    /// Failed connect/send attempts
    connect_failures: u64,
    /// Batches fully sent (whether or not every slot completed)
    batches: u64,
}

impl WorkerStats {
    /// Completed responses counted so far.
    pub fn responses(&self) -> u64 {
        self.status_classes.iter().sum()
    }

    /// Completed responses in one status class; `class` is the leading
    /// digit (1..=5).
    pub fn class_count(&self, class: u8) -> u64 {
        assert!((1..=5).contains(&class));
        self.status_classes[usize::from(class) - 1]
    }

    /// Protocol errors and connection failures combined.
    pub fn errors(&self) -> u64 {
        self.response_errors + self.connect_failures
    }

    /// Batches fully written to the socket.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Folds another worker's tallies into this one.
    pub fn merge(&mut self, other: &WorkerStats) {
        for (mine, theirs) in self.status_classes.iter_mut().zip(other.status_classes) {
            *mine += theirs;
        }
        self.response_errors += other.response_errors;
        self.connect_failures += other.connect_failures;
        self.batches += other.batches;
    }

    /// Tallies one drained batch. Counting stops at the first
    /// non-completed slot: the slots after it were never fed.
    fn record_batch(&mut self, responses: &[Response]) {
        self.batches += 1;
        for response in responses {
            if !response.is_complete() {
                self.response_errors += 1;
                return;
            }
            match response.status_class() {
                Some(class) => self.status_classes[usize::from(class) - 1] += 1,
                None => self.response_errors += 1,
            }
        }
    }

    fn record_connect_failure(&mut self) {
        self.connect_failures += 1;
    }
}

/// Runs the load loop until `token` is cancelled and returns this worker's
/// tallies.
///
/// Each iteration opens a fresh connection, sends one pipelined batch and
/// tallies the result; any failure rotates to a new connection on the next
/// iteration. An invalid target URL is fatal and ends the worker early.
pub async fn run_worker(opts: WorkerOptions, token: CancellationToken) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while !token.is_cancelled() {
        let mut connection = match Connection::new(&opts.url, opts.pipeline_depth, &opts.headers) {
            Ok(connection) => connection,
            Err(e) => {
                error!(url = %opts.url, error = %e, "invalid target, stopping worker");
                stats.record_connect_failure();
                return stats;
            }
        };

        if let Err(e) = connection.connect().await {
            warn!(error = %e, "connect failed");
            stats.record_connect_failure();
            continue;
        }

        match connection.send_requests().await {
            Ok(responses) => stats.record_batch(responses),
            Err(e) => {
                warn!(error = %e, "batch failed");
                stats.record_connect_failure();
            }
        }
        // connection dropped here; no reuse across batches
    }

    stats
}
