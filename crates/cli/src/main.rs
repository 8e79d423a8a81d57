//! The `volley` command-line load generator.
//!
//! Thin glue around the `volley` core: parse arguments, spawn one worker
//! task per configured connection, let them run for the requested duration,
//! then cancel, merge the per-worker stats and print a summary.

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use volley::worker::{self, WorkerOptions, WorkerStats};

#[derive(Parser, Debug)]
#[command(name = "volley", version, about = "pipelined HTTP/1.1 load generator")]
struct Args {
    /// Target URL (http or https)
    url: String,

    /// Number of concurrent connections
    #[arg(short, long, default_value_t = 1)]
    connections: usize,

    /// Requests pipelined per batch on each connection
    #[arg(short, long, default_value_t = 16)]
    pipeline: usize,

    /// Benchmark duration in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    /// Extra header line, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(
        url = %args.url,
        connections = args.connections,
        pipeline = args.pipeline,
        duration = args.duration,
        "starting run"
    );

    let token = CancellationToken::new();
    let mut workers = Vec::with_capacity(args.connections);
    for _ in 0..args.connections {
        let opts = WorkerOptions {
            url: args.url.clone(),
            pipeline_depth: args.pipeline,
            headers: args.headers.clone(),
        };
        workers.push(tokio::spawn(worker::run_worker(opts, token.clone())));
    }

    tokio::time::sleep(Duration::from_secs(args.duration)).await;
    token.cancel();

    let mut totals = WorkerStats::default();
    for handle in workers {
        match handle.await {
            Ok(stats) => totals.merge(&stats),
            Err(e) => eprintln!("worker panicked: {e}"),
        }
    }

    print_summary(&totals, args.duration);
}

fn print_summary(stats: &WorkerStats, duration: u64) {
    let per_second = if duration > 0 { stats.responses() / duration } else { stats.responses() };

    println!("responses:  {}", stats.responses());
    println!("rate:       {per_second} responses/sec");
    for class in 1..=5u8 {
        let count = stats.class_count(class);
        if count > 0 {
            println!("  {class}xx:      {count}");
        }
    }
    println!("errors:     {}", stats.errors());
    println!("batches:    {}", stats.batches());
}
