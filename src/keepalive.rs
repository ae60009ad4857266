//! Periodic keepalive pings to all connected clients.
//!
//! Keeps intermediary network devices from closing idle links. This is not a
//! liveness-timeout mechanism: pong replies are never waited on or evaluated,
//! the inbound `"pong"` token is only filtered out of history by the relay.

use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ws::{broadcast, relay, ConnectionRegistry};

/// Interval task sending the `"ping"` token to every open connection.
///
/// The task runs exactly while the registry is non-empty (and keepalive is
/// enabled). Callers reconcile after every registry mutation via [`sync`],
/// which reads membership and starts or stops the task under one lock, so
/// racing opens and closes settle on whatever the final membership is.
///
/// [`sync`]: KeepAlive::sync
pub struct KeepAlive {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    /// Reconcile the interval task with current registry membership.
    ///
    /// Non-empty registry and `enabled` → ensure the task runs; empty
    /// registry → ensure it is stopped. Idempotent in both directions:
    /// re-syncing an already-correct state is a no-op.
    pub fn sync(&self, registry: &ConnectionRegistry, enabled: bool) {
        let Ok(mut task) = self.task.lock() else {
            tracing::error!("Keepalive task lock poisoned");
            return;
        };

        let occupied = !registry.is_empty();
        if occupied && enabled && task.is_none() {
            tracing::info!("Clients connected, starting keepalive");
            let interval = self.interval;
            let registry = registry.clone();
            *task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // Skip the first immediate tick
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    broadcast::broadcast_text(&registry, relay::PING_TOKEN, None);
                }
            }));
        } else if !occupied {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::info!("Last client disconnected, keepalive stopped");
            }
        }
    }

    /// Stop the interval task if it is running.
    pub fn stop(&self) {
        let Ok(mut task) = self.task.lock() else {
            tracing::error!("Keepalive task lock poisoned");
            return;
        };
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop();
    }
}
