use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use ws_relay::config::{generate_config_template, Cli, Config};
use ws_relay::history::HistoryStore;
use ws_relay::routes;
use ws_relay::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Resolve config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "ws_relay=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "ws_relay=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("ws-relay v{} starting", env!("CARGO_PKG_VERSION"));

    // Load existing messages from the history file (best-effort)
    let history = HistoryStore::load(
        PathBuf::from(&config.history_file),
        config.max_messages,
        config.save_to_file,
    )
    .into_handle();

    // Build application state and router
    let state = AppState::new(&config, history);
    let app = routes::build_router(state, &config);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        "Listening on {} with WebSocket endpoint at {}",
        addr,
        config.ws_path
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
