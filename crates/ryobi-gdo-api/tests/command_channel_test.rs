#![allow(clippy::unwrap_used)]
// Integration tests for `CommandChannel` against an in-process WebSocket
// peer. Each test scripts the peer's side of the session and asserts the
// client's frames, retry behavior, and teardown from the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use url::Url;

use ryobi_gdo_api::{CommandChannel, Error, RetryPolicy, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

type ServerWs = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/api/wsrpc")).unwrap();
    (listener, url)
}

fn channel(endpoint: Url) -> CommandChannel {
    let transport = TransportConfig {
        timeout: Duration::from_millis(500),
        retry: RetryPolicy::default(),
    };
    CommandChannel::new(endpoint, &transport)
}

fn api_key() -> SecretString {
    "abc123".to_string().into()
}

async fn accept_ws(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn read_json(ws: &mut ServerWs) -> serde_json::Value {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got: {other:?}"),
    }
}

async fn send_json(ws: &mut ServerWs, value: serde_json::Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

fn auth_ack() -> serde_json::Value {
    json!({ "jsonrpc": "2.0", "id": 3, "result": true })
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_command_round_trip() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        let auth = read_json(&mut ws).await;
        assert_eq!(
            auth,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "srvWebSocketAuth",
                "params": { "varName": "user@example.com", "apiKey": "abc123" }
            })
        );
        send_json(&mut ws, auth_ack()).await;

        let command = read_json(&mut ws).await;
        assert_eq!(
            command,
            json!({
                "jsonrpc": "2.0",
                "method": "gdoModuleCommand",
                "params": {
                    "msgType": 16,
                    "moduleType": 5,
                    "portId": 7,
                    "moduleMsg": { "doorCommand": 0 },
                    "topic": "gd_1234"
                }
            })
        );
        // A stray ping between frames must not be mistaken for the ack.
        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        send_json(&mut ws, json!({ "jsonrpc": "2.0", "result": true })).await;

        // The client closes exactly once after the ack.
        let mut closes = 0;
        while let Some(frame) = ws.next().await {
            if matches!(frame, Ok(Message::Close(_))) {
                closes += 1;
            }
        }
        closes
    });

    channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(0))
        .await
        .unwrap();

    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn test_teardown_is_bounded_when_the_peer_goes_silent() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        read_json(&mut ws).await;
        send_json(&mut ws, auth_ack()).await;
        read_json(&mut ws).await;
        send_json(&mut ws, json!({ "jsonrpc": "2.0", "result": true })).await;

        // Hold the socket open without reading, so the close handshake
        // gets no cooperation from the peer.
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(ws);
    });

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        channel(url).send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1)),
    )
    .await
    .expect("send must finish without waiting on the silent peer");

    result.unwrap();
    server.abort();
}

// ── Connect/auth retry loop ─────────────────────────────────────────

#[tokio::test]
async fn test_auth_retries_on_fresh_connections() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let server_accepts = Arc::clone(&accepts);

    let server = tokio::spawn(async move {
        // Kill the first two connections before the handshake completes.
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }

        let (stream, _) = listener.accept().await.unwrap();
        server_accepts.fetch_add(1, Ordering::SeqCst);
        let mut ws = accept_async(stream).await.unwrap();

        read_json(&mut ws).await;
        send_json(&mut ws, auth_ack()).await;
        read_json(&mut ws).await;
        send_json(&mut ws, json!({ "jsonrpc": "2.0", "result": true })).await;
        while ws.next().await.is_some() {}
    });

    channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1))
        .await
        .unwrap();

    server.await.unwrap();
    assert_eq!(accepts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_auth_gives_up_after_five_attempts() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let server_accepts = Arc::clone(&accepts);

    let server = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            server_accepts.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let result = channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1))
        .await;

    assert!(
        matches!(result, Err(Error::WebSocketConnect(_))),
        "expected WebSocketConnect, got: {result:?}"
    );
    assert_eq!(accepts.load(Ordering::SeqCst), 5);
    server.abort();
}

#[tokio::test]
async fn test_auth_rejection_is_not_retried() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let server_accepts = Arc::clone(&accepts);

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        server_accepts.fetch_add(1, Ordering::SeqCst);
        let mut ws = accept_async(stream).await.unwrap();

        read_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "error": { "code": -32000, "message": "invalid api key" }
            }),
        )
        .await;

        // The client tears the refused connection down before giving up.
        let mut saw_close = false;
        while let Some(frame) = ws.next().await {
            if matches!(frame, Ok(Message::Close(_))) {
                saw_close = true;
            }
        }
        saw_close
    });

    let result = channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1))
        .await;

    assert!(
        matches!(result, Err(Error::CommandRejected { code: -32000, .. })),
        "expected CommandRejected, got: {result:?}"
    );
    assert!(server.await.unwrap(), "the refused connection must still be closed");
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

// ── Send retry loop ─────────────────────────────────────────────────

#[tokio::test]
async fn test_send_failures_exhaust_without_reconnecting() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let server_accepts = Arc::clone(&accepts);

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        server_accepts.fetch_add(1, Ordering::SeqCst);
        let mut ws = accept_async(stream).await.unwrap();

        read_json(&mut ws).await;
        send_json(&mut ws, auth_ack()).await;

        // Take the command frame, then vanish without acknowledging.
        read_json(&mut ws).await;
        drop(ws);
    });

    let result = channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(0))
        .await;

    assert!(
        matches!(result, Err(Error::WebSocket(_))),
        "expected WebSocket transport error, got: {result:?}"
    );
    server.await.unwrap();
    assert_eq!(
        accepts.load(Ordering::SeqCst),
        1,
        "send retries must stay on the established connection"
    );
}

#[tokio::test]
async fn test_send_timeout_retries_on_the_same_connection() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        read_json(&mut ws).await;
        send_json(&mut ws, auth_ack()).await;

        // Sit on the first command until the client's ack read times out
        // and it resends, then acknowledge once.
        let first = read_json(&mut ws).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = read_json(&mut ws).await;
        assert_eq!(first, second, "the resent frame must be identical");
        send_json(&mut ws, json!({ "jsonrpc": "2.0", "result": true })).await;

        while ws.next().await.is_some() {}
    });

    channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1))
        .await
        .unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn test_command_rejection_is_not_retried() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        read_json(&mut ws).await;
        send_json(&mut ws, auth_ack()).await;

        let mut commands = 0;
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(_))) => {
                    commands += 1;
                    send_json(
                        &mut ws,
                        json!({ "jsonrpc": "2.0", "error": { "code": 42, "message": "jammed" } }),
                    )
                    .await;
                }
                Some(Ok(_)) | Some(Err(_)) => {}
                None => break,
            }
        }
        commands
    });

    let result = channel(url)
        .send("user@example.com", &api_key(), "gd_1234", "doorCommand", json!(1))
        .await;

    assert!(
        matches!(result, Err(Error::CommandRejected { code: 42, .. })),
        "expected CommandRejected, got: {result:?}"
    );
    assert_eq!(server.await.unwrap(), 1, "a rejected command must not be resent");
}
