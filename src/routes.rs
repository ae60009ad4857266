use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Router,
};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /history — the read-only export of stored history.
/// Returns the `message` field of every stored entry, one per line, as plain text.
async fn history_export(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.clone();
    let lines = tokio::task::spawn_blocking(move || match history.lock() {
        Ok(log) => Ok(log.snapshot()),
        Err(e) => {
            tracing::error!(error = %e, "History lock poisoned during export");
            Err(())
        }
    })
    .await
    .unwrap_or(Err(()));

    match lines {
        Ok(lines) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            lines.join("\n"),
        ),
        Err(()) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Error retrieving message history".to_string(),
        ),
    }
}

/// GET /health — liveness probe.
async fn health_check() -> &'static str {
    "ok"
}

/// Build the axum Router: WebSocket endpoint at the configured path, the
/// plain-text history export, a health check, and the static web UI as the
/// fallback service.
pub fn build_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route(&config.ws_path, axum::routing::get(ws_handler::ws_upgrade))
        .route("/history", axum::routing::get(history_export))
        .route("/health", axum::routing::get(health_check))
        .fallback_service(ServeDir::new(&config.public_dir))
        .with_state(state)
}
