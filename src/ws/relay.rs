//! Core relay semantics: what happens when a connection opens, sends a text
//! frame, or closes.
//!
//! Every inbound text frame is recorded in history, persisted, and fanned out
//! to all open connections including the sender — the self-echo is how the
//! originating client learns its message was received. The reserved `"pong"`
//! token is the keepalive reply and is consumed without recording or fan-out.

use chrono::Utc;

use crate::history::StoredMessage;
use crate::state::AppState;
use crate::ws::{broadcast, ConnectionId, ConnectionSender};

/// Reserved inbound control token: a client's reply to a keepalive ping.
pub const PONG_TOKEN: &str = "pong";
/// Reserved outbound control token sent by the keepalive task.
pub const PING_TOKEN: &str = "ping";

/// Register a freshly opened connection.
///
/// If this is the first connection and keepalive is enabled, the keepalive
/// interval starts. No history is replayed to the new connection; clients
/// pull prior messages from the /history endpoint instead.
pub fn on_open(state: &AppState, id: ConnectionId, sender: ConnectionSender) {
    state.connections.insert(id, sender);
    tracing::info!(
        connection_id = id,
        clients = state.connections.len(),
        "Connection opened"
    );

    state
        .keepalive
        .sync(&state.connections, state.keepalive_enabled);
}

/// Handle one inbound text frame from a connection.
///
/// The append (with eviction and file rewrite) runs under the history lock on
/// a blocking thread and is awaited before fan-out, so messages from a single
/// connection reach history and recipients in send order.
pub async fn on_text(state: &AppState, id: ConnectionId, client_id: &str, text: &str) {
    if text == PONG_TOKEN {
        tracing::debug!(connection_id = id, "Keepalive pong");
        return;
    }

    let record = StoredMessage {
        timestamp: Utc::now().to_rfc3339(),
        message: text.to_string(),
        client_id: client_id.to_string(),
    };

    let history = state.history.clone();
    let appended = tokio::task::spawn_blocking(move || match history.lock() {
        Ok(mut log) => {
            log.append(record);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "History lock poisoned, message not recorded");
            false
        }
    })
    .await
    .unwrap_or(false);

    if !appended {
        // Still relay: a persistence-side failure must not block broadcasting.
        tracing::warn!(connection_id = id, "Relaying message that was not recorded");
    }

    broadcast::broadcast_text(&state.connections, text, None);
}

/// Unregister a connection after its actor exits, for any reason.
///
/// Idempotent: a connection that was already removed is a no-op. When the
/// last client leaves, the keepalive interval stops.
pub fn on_close(state: &AppState, id: ConnectionId) {
    state.connections.remove(&id);
    tracing::info!(
        connection_id = id,
        clients = state.connections.len(),
        "Connection closed"
    );

    state
        .keepalive
        .sync(&state.connections, state.keepalive_enabled);
}
