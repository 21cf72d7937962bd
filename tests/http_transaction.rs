// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end attribution over real sockets.
//!
//! Two instrumented HTTP/1.1 servers share one agent. The front server calls
//! the status server while handling each request, so every front request
//! produces two inbound transactions and one outbound call.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use appmon::agent::environment::DISPATCHER;
use appmon::instrumentation::InstrumentationHooks;
use appmon::transaction::propagator;
use appmon::{Agent, RecordOutcome};

// ============================================================================
// Minimal HTTP plumbing
// ============================================================================

async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn get(addr: SocketAddr, path: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
    stream.write_all(request.as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default())
}

async fn handle(mut stream: TcpStream, agent: Agent, downstream: Option<SocketAddr>) -> std::io::Result<()> {
    let head = read_head(&mut stream).await?;
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    let txn = agent.on_inbound_start(&path);
    let body = propagator::scope(Some(Arc::clone(&txn)), async {
        match downstream {
            Some(addr) => {
                let segment = agent.on_outbound_start("localhost", "/status");
                let reply = get(addr, "/status").await;
                agent.on_outbound_end(segment);
                reply
            }
            None => Ok("ok".to_string()),
        }
    })
    .await?;

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    // Ended before the client sees EOF, so the client observes final metrics.
    agent.on_inbound_end(&txn);
    stream.shutdown().await
}

async fn start_server(agent: &Agent, downstream: Option<SocketAddr>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = agent.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle(stream, agent.clone(), downstream));
        }
    });
    addr
}

async fn start_pair(agent: &Agent) -> SocketAddr {
    let status = start_server(agent, None).await;
    start_server(agent, Some(status)).await
}

fn call_count(agent: &Agent, name: &str, scope: Option<&str>) -> u64 {
    agent
        .metrics()
        .get_existing(name, scope)
        .map(|metric| metric.stats().call_count)
        .unwrap_or(0)
}

// ============================================================================
// Attribution
// ============================================================================

#[tokio::test]
async fn test_inbound_request_with_outbound_call() {
    let agent = Agent::new();
    let front = start_pair(&agent).await;

    let body = get(front, "/path").await.unwrap();
    assert_eq!(body, "ok");

    assert_eq!(call_count(&agent, "WebTransaction/Uri/path", None), 1);
    assert_eq!(call_count(&agent, "WebTransaction/Uri/status", None), 1);
    // One per inbound transaction: /path and the /status it called.
    assert_eq!(call_count(&agent, "HttpDispatcher", None), 2);

    assert_eq!(call_count(&agent, "External/localhost/http", None), 1);
    assert_eq!(
        call_count(&agent, "External/localhost/http", Some("WebTransaction/Uri/path")),
        1
    );
    assert_eq!(
        call_count(&agent, "External/localhost/http", Some("WebTransaction/Uri/status")),
        0
    );

    assert_eq!(agent.environment().get(DISPATCHER).as_deref(), Some("http"));
    assert!(agent.get_transaction().is_none());
    assert_eq!(agent.active_transactions(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_do_not_cross_attribute() {
    let agent = Agent::new();
    let front = start_pair(&agent).await;

    let (a, b, c) = tokio::join!(get(front, "/a"), get(front, "/b"), get(front, "/a"));
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    assert_eq!(call_count(&agent, "WebTransaction/Uri/a", None), 2);
    assert_eq!(call_count(&agent, "WebTransaction/Uri/b", None), 1);
    assert_eq!(call_count(&agent, "HttpDispatcher", None), 6);
    assert_eq!(
        call_count(&agent, "External/localhost/http", Some("WebTransaction/Uri/a")),
        2
    );
    assert_eq!(
        call_count(&agent, "External/localhost/http", Some("WebTransaction/Uri/b")),
        1
    );
    assert_eq!(call_count(&agent, "External/localhost/http", None), 3);
}

#[tokio::test]
async fn test_outbound_call_outside_transaction_is_global() {
    let agent = Agent::new();
    let status = start_server(&agent, None).await;

    let segment = agent.on_outbound_start("localhost", "/status");
    assert!(segment.transaction().is_none());
    get(status, "/status").await.unwrap();

    assert_eq!(agent.on_outbound_end(segment), RecordOutcome::Global);
    assert_eq!(call_count(&agent, "External/localhost/http", None), 1);
    assert_eq!(call_count(&agent, "WebTransaction/Uri/status", None), 1);
    assert_eq!(call_count(&agent, "HttpDispatcher", None), 1);
}

#[tokio::test]
async fn test_finished_transactions_are_broadcast() {
    let agent = Agent::new();
    let mut finished = agent.subscribe();
    let front = start_pair(&agent).await;

    get(front, "/path").await.unwrap();

    // The downstream transaction ends first.
    let first = finished.recv().await.unwrap();
    let second = finished.recv().await.unwrap();
    assert_eq!(first.name().as_deref(), Some("WebTransaction/Uri/status"));
    assert_eq!(second.name().as_deref(), Some("WebTransaction/Uri/path"));
    assert!(second.is_ended());
    assert!(second.ended_at().is_some());

    let external = second.metrics().get_existing("External/localhost/http", None).unwrap();
    assert_eq!(external.stats().call_count, 1);
    assert!(first.metrics().is_empty());
}
