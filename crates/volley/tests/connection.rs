//! End-to-end tests for the pipelined connection driver against scripted
//! loopback servers.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use volley::connection::Connection;
use volley::protocol::{ParseState, Response};
use volley::worker::{self, WorkerOptions};

fn count_requests(bytes: &[u8]) -> usize {
    if bytes.len() < 4 {
        return 0;
    }
    bytes.windows(4).filter(|w| w == b"\r\n\r\n").count()
}

/// Accepts one connection, reads until `expected_requests` full requests
/// arrived, then writes the scripted parts (with a small pause between
/// them, to force the client through partial reads) and closes. Returns
/// the request bytes the server saw.
async fn spawn_scripted_server(expected_requests: usize, parts: Vec<Vec<u8>>) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut seen = Vec::new();
        let mut buf = [0u8; 4096];
        while count_requests(&seen) < expected_requests {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending all requests");
            seen.extend_from_slice(&buf[..n]);
        }

        for part in parts {
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        socket.shutdown().await.unwrap();
        seen
    });

    (addr, handle)
}

fn default_slot() -> Response {
    Response::new()
}

#[tokio::test]
async fn full_pipeline_completes_in_order() {
    let responses = vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec(),
        b"HTTP/1.1 503 Unavailable\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nbusy\r\n0\r\n\r\n".to_vec(),
    ];
    let (addr, server) = spawn_scripted_server(3, responses).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 3, &[]).unwrap();
    connection.connect().await.unwrap();
    let slots = connection.send_requests().await.unwrap();

    assert_eq!(slots.len(), 3);
    let codes: Vec<u16> = slots.iter().map(Response::status_code).collect();
    assert_eq!(codes, vec![200, 404, 503]);
    assert!(slots.iter().all(Response::is_complete));
    assert_eq!(slots[0].content_length(), 5);
    assert_eq!(slots[2].content_length(), 4);

    let seen = server.await.unwrap();
    assert_eq!(count_requests(&seen), 3);
    let text = std::str::from_utf8(&seen).unwrap();
    assert!(text.starts_with(&format!("GET / HTTP/1.1\r\nHost: {addr}\r\n\r\n")));
}

#[tokio::test]
async fn responses_split_across_many_reads() {
    // one logical response stream cut into arbitrary fragments
    let stream: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Le\
                          ngth: 11\r\n\r\nhello world\
                          HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n";
    let parts = stream.chunks(7).map(<[u8]>::to_vec).collect();
    let (addr, server) = spawn_scripted_server(2, parts).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 2, &[]).unwrap();
    connection.connect().await.unwrap();
    let slots = connection.send_requests().await.unwrap();

    assert!(slots.iter().all(Response::is_complete));
    assert_eq!(slots[0].status_code(), 200);
    assert_eq!(slots[0].content_length(), 11);
    assert_eq!(slots[1].status_code(), 201);

    server.await.unwrap();
}

#[tokio::test]
async fn early_close_leaves_remaining_slots_reset() {
    let responses = vec![b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec()];
    let (addr, server) = spawn_scripted_server(3, responses).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 3, &[]).unwrap();
    connection.connect().await.unwrap();
    let slots = connection.send_requests().await.unwrap();

    assert_eq!(slots[0].state(), ParseState::Completed);
    assert_eq!(slots[0].status_code(), 200);
    assert_eq!(slots[1], default_slot());
    assert_eq!(slots[2], default_slot());
    // the caller detects the short batch by scanning for a non-completed slot
    assert_eq!(slots.iter().filter(|r| r.is_complete()).count(), 1);

    server.await.unwrap();
}

#[tokio::test]
async fn protocol_error_stops_the_batch() {
    let responses = vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec(),
        b"GARBAGE 200 OK\r\n\r\n".to_vec(),
    ];
    let (addr, server) = spawn_scripted_server(3, responses).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 3, &[]).unwrap();
    connection.connect().await.unwrap();
    let slots = connection.send_requests().await.unwrap();

    assert_eq!(slots[0].state(), ParseState::Completed);
    assert_eq!(slots[1].state(), ParseState::Error);
    assert_eq!(slots[2], default_slot());

    server.await.unwrap();
}

#[tokio::test]
async fn reconnect_on_connected_instance_is_a_noop() {
    let responses = vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()];
    let (addr, server) = spawn_scripted_server(1, responses).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 1, &[]).unwrap();
    connection.connect().await.unwrap();
    connection.connect().await.unwrap();
    let slots = connection.send_requests().await.unwrap();
    assert!(slots[0].is_complete());

    server.await.unwrap();
}

#[tokio::test]
async fn send_before_connect_is_a_transport_error() {
    let mut connection = Connection::new("http://127.0.0.1:9/", 1, &[]).unwrap();
    assert!(connection.send_requests().await.is_err());
}

#[tokio::test]
async fn close_is_idempotent() {
    let responses = vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()];
    let (addr, server) = spawn_scripted_server(1, responses).await;

    let mut connection = Connection::new(&format!("http://{addr}/"), 1, &[]).unwrap();
    connection.connect().await.unwrap();
    connection.send_requests().await.unwrap();
    connection.close();
    connection.close();

    server.await.unwrap();
}

#[tokio::test]
async fn connect_failure_surfaces_as_error() {
    // a port nothing listens on
    let mut connection = Connection::new("http://127.0.0.1:1/", 1, &[]).unwrap();
    assert!(connection.connect().await.is_err());
}

#[tokio::test]
async fn worker_tallies_batches_until_cancelled() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // serve one two-deep batch per connection, forever
    let server = tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                let mut buf = [0u8; 4096];
                while count_requests(&seen) < 2 {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    seen.extend_from_slice(&buf[..n]);
                }
                let body = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".repeat(2);
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let opts = WorkerOptions { url: format!("http://{addr}/"), pipeline_depth: 2, headers: vec![] };
    let token = CancellationToken::new();
    let worker = tokio::spawn(worker::run_worker(opts, token.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    let stats = worker.await.unwrap();

    assert!(stats.batches() > 0);
    assert_eq!(stats.responses(), stats.batches() * 2);
    assert_eq!(stats.class_count(2), stats.responses());
    server.abort();
}
