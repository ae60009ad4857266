use axum::extract::ws::Message;

use super::{ConnectionId, ConnectionRegistry};

/// Send a text frame to every registered connection, optionally excluding one.
///
/// Connections whose writer task has gone away (sender closed, connection
/// closing) are skipped silently. There is no queueing or retry for them:
/// the frame is simply dropped for that recipient. Fan-out order across
/// members is unspecified.
pub fn broadcast_text(registry: &ConnectionRegistry, text: &str, excluding: Option<ConnectionId>) {
    for entry in registry.iter() {
        if Some(*entry.key()) == excluding {
            continue;
        }
        let sender = entry.value();
        if sender.is_closed() {
            continue;
        }
        let _ = sender.send(Message::Text(text.into()));
    }
}
