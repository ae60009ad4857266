//! Integration tests for the WebSocket relay: self-echo fan-out, control
//! token suppression, history export, disconnect cleanup, and keepalive.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use ws_relay::config::Config;
use ws_relay::history::HistoryStore;
use ws_relay::routes;
use ws_relay::state::AppState;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;
type WsRead = futures_util::stream::SplitStream<WsStream>;

/// Build a test config backed by a temp history file.
fn test_config(history_file: &std::path::Path) -> Config {
    Config {
        history_file: history_file.to_str().unwrap().to_string(),
        ..Config::default()
    }
}

/// Start the relay on a random port and return (addr, state) so tests can
/// inspect the registry and keepalive directly.
async fn start_test_server(config: &Config) -> (SocketAddr, AppState) {
    let history = HistoryStore::load(
        PathBuf::from(&config.history_file),
        config.max_messages,
        config.save_to_file,
    )
    .into_handle();

    let state = AppState::new(config, history);
    let app = routes::build_router(state.clone(), config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

/// Connect a WebSocket client to the relay.
async fn connect(addr: SocketAddr) -> (WsWrite, WsRead) {
    let ws_url = format!("ws://{}/ws", addr);
    let (stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    stream.split()
}

/// Receive the next text frame within `ms` milliseconds, if any.
async fn recv_text(read: &mut WsRead, ms: u64) -> Option<String> {
    match tokio::time::timeout(Duration::from_millis(ms), read.next()).await {
        Ok(Some(Ok(Message::Text(t)))) => Some(t.as_str().to_string()),
        _ => None,
    }
}

#[tokio::test]
async fn test_message_echoes_to_sender_and_peers_exactly_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, _state) = start_test_server(&config).await;

    let (mut a_write, mut a_read) = connect(addr).await;
    let (_b_write, mut b_read) = connect(addr).await;
    // Let the server finish registering both actors before fanning out
    tokio::time::sleep(Duration::from_millis(100)).await;

    a_write
        .send(Message::Text("hello".into()))
        .await
        .expect("Failed to send");

    assert_eq!(
        recv_text(&mut a_read, 2000).await.as_deref(),
        Some("hello"),
        "sender receives its own message back"
    );
    assert_eq!(
        recv_text(&mut b_read, 2000).await.as_deref(),
        Some("hello"),
        "peer receives the message"
    );

    // Exactly once each: no further frames arrive
    assert!(recv_text(&mut a_read, 300).await.is_none());
    assert!(recv_text(&mut b_read, 300).await.is_none());
}

#[tokio::test]
async fn test_pong_token_is_consumed_silently() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, _state) = start_test_server(&config).await;

    let (mut a_write, mut a_read) = connect(addr).await;
    let (_b_write, mut b_read) = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    a_write
        .send(Message::Text("pong".into()))
        .await
        .expect("Failed to send");

    // Never broadcast, not even to the sender
    assert!(recv_text(&mut a_read, 300).await.is_none());
    assert!(recv_text(&mut b_read, 300).await.is_none());

    // Never recorded
    let body = reqwest::get(format!("http://{}/history", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "");
}

#[tokio::test]
async fn test_history_export_lists_messages_in_arrival_order() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, _state) = start_test_server(&config).await;

    let (mut a_write, mut a_read) = connect(addr).await;
    a_write.send(Message::Text("first".into())).await.unwrap();
    assert_eq!(recv_text(&mut a_read, 2000).await.as_deref(), Some("first"));

    let (mut b_write, mut b_read) = connect(addr).await;
    b_write.send(Message::Text("second".into())).await.unwrap();
    assert_eq!(recv_text(&mut b_read, 2000).await.as_deref(), Some("second"));

    let body = reqwest::get(format!("http://{}/history", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "first\nsecond");
}

#[tokio::test]
async fn test_eviction_visible_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        max_messages: 3,
        ..test_config(&tmp.path().join("messages.json"))
    };
    let (addr, _state) = start_test_server(&config).await;

    let (mut write, mut read) = connect(addr).await;
    for text in ["a", "b", "c", "d"] {
        write.send(Message::Text(text.into())).await.unwrap();
        // Await the echo so appends are ordered before the next send
        assert_eq!(recv_text(&mut read, 2000).await.as_deref(), Some(text));
    }

    let body = reqwest::get(format!("http://{}/history", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "b\nc\nd");
}

#[tokio::test]
async fn test_history_file_written_and_reloadable() {
    let tmp = tempfile::tempdir().unwrap();
    let history_file = tmp.path().join("messages.json");
    let config = test_config(&history_file);
    let (addr, _state) = start_test_server(&config).await;

    let (mut write, mut read) = connect(addr).await;
    write.send(Message::Text("persist me".into())).await.unwrap();
    assert_eq!(
        recv_text(&mut read, 2000).await.as_deref(),
        Some("persist me")
    );

    // The file is rewritten before the broadcast, so it exists by now
    let contents = std::fs::read_to_string(&history_file).expect("history file written");
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "persist me");
    let client_id = entries[0]["clientId"].as_str().unwrap();
    assert!(
        client_id.starts_with("127.0.0.1:"),
        "clientId is the sender's ip:port, got {}",
        client_id
    );
    assert!(entries[0]["timestamp"].as_str().is_some());

    // A fresh store loaded from the same file sees the same sequence,
    // which is what a process restart does
    let reloaded = HistoryStore::load(history_file, config.max_messages, true);
    assert_eq!(reloaded.snapshot(), vec!["persist me"]);
}

#[tokio::test]
async fn test_disconnect_cleans_up_registry() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, state) = start_test_server(&config).await;

    {
        let (mut write, _read) = connect(addr).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.connections.len(), 1);

        write.send(Message::Close(None)).await.unwrap();
    }

    // Give the server a moment to clean up
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(state.connections.is_empty(), "connection must be unregistered");

    // A dropped-without-close-frame connection is cleaned up too
    {
        let (_write, _read) = connect(addr).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.connections.len(), 1);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(state.connections.is_empty());
}

#[tokio::test]
async fn test_broadcast_reaches_remaining_client_after_peer_drops() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, _state) = start_test_server(&config).await;

    let (mut a_write, mut a_read) = connect(addr).await;

    // B connects and then drops abruptly
    {
        let (_b_write, _b_read) = connect(addr).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    a_write.send(Message::Text("still here".into())).await.unwrap();
    assert_eq!(
        recv_text(&mut a_read, 2000).await.as_deref(),
        Some("still here"),
        "fan-out completes despite the departed peer"
    );
}

#[tokio::test]
async fn test_keepalive_pings_clients_and_stops_when_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        keepalive_enabled: true,
        keepalive_interval_secs: 1,
        ..test_config(&tmp.path().join("messages.json"))
    };
    let (addr, state) = start_test_server(&config).await;
    assert!(!state.keepalive.is_running());

    let (mut write, mut read) = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        state.keepalive.is_running(),
        "keepalive starts on first connection"
    );

    assert_eq!(
        recv_text(&mut read, 3000).await.as_deref(),
        Some("ping"),
        "client receives the keepalive token"
    );

    // Replying "pong" pollutes neither history nor the broadcast stream
    write.send(Message::Text("pong".into())).await.unwrap();
    assert!(recv_text(&mut read, 300).await.map_or(true, |t| t == "ping"));

    write.send(Message::Close(None)).await.unwrap();
    drop(write);
    drop(read);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        !state.keepalive.is_running(),
        "keepalive stops when the last client leaves"
    );

    let body = reqwest::get(format!("http://{}/history", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "", "pong replies are never recorded");
}

#[tokio::test]
async fn test_keepalive_disabled_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp.path().join("messages.json"));
    let (addr, state) = start_test_server(&config).await;

    let (_write, _read) = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !state.keepalive.is_running(),
        "keepalive stays dormant unless enabled by config"
    );
}
