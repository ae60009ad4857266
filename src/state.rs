use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::history::HistoryHandle;
use crate::keepalive::KeepAlive;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via the axum State extractor.
///
/// Each `AppState` owns its own registry, history, and keepalive — there are
/// no process-wide singletons, so multiple independent relay instances can
/// coexist in one process (and in tests).
#[derive(Clone)]
pub struct AppState {
    /// Bounded message history wrapped in Arc<Mutex>
    pub history: HistoryHandle,
    /// Active WebSocket connections
    pub connections: ConnectionRegistry,
    /// Keepalive interval task, started/stopped on registry size transitions
    pub keepalive: Arc<KeepAlive>,
    /// Whether the keepalive is wired up at all (config choice, off by default)
    pub keepalive_enabled: bool,
}

impl AppState {
    /// Build state for one relay instance from its config and loaded history.
    pub fn new(config: &Config, history: HistoryHandle) -> Self {
        Self {
            history,
            connections: crate::ws::new_connection_registry(),
            keepalive: Arc::new(KeepAlive::new(Duration::from_secs(
                config.keepalive_interval_secs,
            ))),
            keepalive_enabled: config.keepalive_enabled,
        }
    }
}
