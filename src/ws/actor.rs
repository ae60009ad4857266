use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::relay;

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: processes incoming frames, dispatches to the relay
///
/// The mpsc channel allows any part of the system (broadcast fan-out,
/// keepalive) to send frames to this client by cloning the sender.
///
/// All exit paths — clean close frame, receive error, stream end — funnel
/// into the same cleanup, so a transport failure still unregisters the
/// connection and never leaks registry membership.
pub async fn run_connection(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = crate::ws::next_connection_id();
    let client_id = addr.to_string();

    relay::on_open(&state, conn_id, tx.clone());

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    relay::on_text(&state, conn_id, &client_id, text.as_str()).await;
                }
                Message::Binary(data) => {
                    // The relay protocol is text-only; binary frames are ignored.
                    tracing::debug!(
                        connection_id = conn_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Ping(data) => {
                    // Respond to protocol-level pings with pongs
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Pong(_) => {
                    // Transport-level pong; the app-level token is handled in relay
                }
                Message::Close(frame) => {
                    tracing::debug!(
                        connection_id = conn_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = conn_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::debug!(connection_id = conn_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort the writer and remove this connection from the registry
    writer_handle.abort();
    relay::on_close(&state, conn_id);
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
