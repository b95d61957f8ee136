//! Integration tests for the realtime client against a local WebSocket server

use futures_util::{SinkExt, StreamExt};
use nfc_realtime::events::{AttendanceTracker, EventKind};
use nfc_realtime::realtime::{ClientConfig, ConnectionState, RealtimeClient, RealtimeError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn fast_config(url: &str) -> ClientConfig {
    ClientConfig::new(url)
        .base_delay(Duration::from_millis(20))
        .max_delay(Duration::from_millis(200))
        .without_keepalive()
}

async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<tokio::net::TcpStream>) -> String {
    loop {
        match timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(_)) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_round_trip_over_websocket() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = client.subscribe(move |msg| {
        let _ = tx.send(msg.clone());
    });

    client.connect();
    let mut server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();

    server
        .send(Message::Text(r#"{"type":"accessStats","granted":3}"#.into()))
        .await
        .unwrap();
    let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(EventKind::of(&msg), Some(EventKind::AccessStats));
    assert_eq!(msg.get("granted"), Some(&json!(3)));

    client
        .send(&json!({"type": "subscribe", "channel": "accessLogs"}))
        .unwrap();
    let sent: Value = serde_json::from_str(&next_text(&mut server).await).unwrap();
    assert_eq!(sent, json!({"type": "subscribe", "channel": "accessLogs"}));

    client.close();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_reconnects_after_server_drops() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));

    client.connect();
    let server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();

    let mut states = client.state_changes();
    drop(server);
    timeout(WAIT, states.wait_for(|s| *s != ConnectionState::Open))
        .await
        .unwrap()
        .unwrap();

    let _server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();
    client.close();
}

#[tokio::test]
async fn test_reconnects_after_close_frame() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));

    client.connect();
    let mut server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();

    server.close(None).await.unwrap();
    let _server = accept(&listener).await;

    let mut states = client.state_changes();
    timeout(WAIT, states.wait_for(|s| *s == ConnectionState::Open))
        .await
        .unwrap()
        .unwrap();
    client.close();
}

#[tokio::test]
async fn test_gives_up_on_unreachable_endpoint() {
    let (listener, url) = bind().await;
    drop(listener);

    let client = RealtimeClient::new(fast_config(&url).max_reconnects(2));
    client.connect();

    let result = timeout(WAIT, client.wait_until_open()).await.unwrap();
    assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
    assert_eq!(client.state(), ConnectionState::GivenUp);
    assert!(client.send(&json!({"type": "ping"})).is_err());
}

#[tokio::test]
async fn test_close_before_worker_runs_never_connects() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));

    client.connect();
    client.close();

    let accepted = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(accepted.is_err(), "client connected after close");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_malformed_message_does_not_drop_connection() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = client.subscribe(move |msg| {
        let _ = tx.send(msg.clone());
    });

    client.connect();
    let mut server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();

    server.send(Message::Text("{oops".into())).await.unwrap();
    server
        .send(Message::Text(r#"{"type":"accessLogs","logs":[]}"#.into()))
        .await
        .unwrap();

    let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(msg.message_type(), Some("accessLogs"));
    assert_eq!(client.state(), ConnectionState::Open);
    client.close();
}

#[tokio::test]
async fn test_attendance_tracker_follows_feed() {
    let (listener, url) = bind().await;
    let client = RealtimeClient::new(fast_config(&url));
    let tracker = Arc::new(Mutex::new(AttendanceTracker::new()));
    let _tracking = AttendanceTracker::attach(Arc::clone(&tracker), &client);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _done = client.subscribe(move |_| {
        let _ = tx.send(());
    });

    client.connect();
    let mut server = accept(&listener).await;
    timeout(WAIT, client.wait_until_open()).await.unwrap().unwrap();

    for frame in [
        r#"{"type":"activity","id":1,"status":"present","userName":"Ada"}"#,
        r#"{"type":"activity","id":2,"status":"late","userName":"Alan"}"#,
        r#"{"type":"stats","stats":{"present":1,"late":1,"absent":0}}"#,
    ] {
        server.send(Message::Text(frame.into())).await.unwrap();
    }
    for _ in 0..3 {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    }

    let tracker = tracker.lock();
    assert_eq!(tracker.stats().total(), 2);
    let names: Vec<_> = tracker
        .recent()
        .filter_map(|a| a.user_name.clone())
        .collect();
    assert_eq!(names, vec!["Alan", "Ada"]);
    drop(tracker);
    client.close();
}
