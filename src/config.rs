use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line overlay for [`Config`].
///
/// Every relay setting is an `Option` with no clap default and is skipped
/// during serialization when absent, so the CLI layer only contributes the
/// flags the user actually passed. Built-in defaults live solely in
/// `Config::default()`, the bottom figment layer — otherwise CLI defaults
/// would shadow every TOML-provided value.
#[derive(Parser, Serialize, Clone, Debug)]
#[command(name = "ws-relay", version, about = "WebSocket broadcast relay with persisted history")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "RELAY_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long, env = "RELAY_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// URL path for the WebSocket endpoint
    #[arg(long, env = "RELAY_WS_PATH")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_path: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./relay.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(
        long,
        env = "RELAY_JSON_LOGS",
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_logs: Option<bool>,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Maximum number of messages retained in history (oldest evicted first)
    #[arg(long, env = "RELAY_MAX_MESSAGES")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,

    /// Path of the JSON file the history is mirrored to
    #[arg(long, env = "RELAY_HISTORY_FILE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<String>,

    /// Mirror the in-memory history to the history file after every message
    #[arg(
        long,
        env = "RELAY_SAVE_TO_FILE",
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_to_file: Option<bool>,

    /// Periodically send the "ping" keepalive token to all connected clients
    #[arg(
        long,
        env = "RELAY_KEEPALIVE_ENABLED",
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_enabled: Option<bool>,

    /// Keepalive interval in seconds
    #[arg(long, env = "RELAY_KEEPALIVE_INTERVAL_SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_interval_secs: Option<u64>,

    /// Directory served as the static web UI
    #[arg(long, env = "RELAY_PUBLIC_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<String>,
}

/// Resolved relay configuration, fixed for the process lifetime.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub ws_path: String,
    pub json_logs: bool,
    pub max_messages: usize,
    pub history_file: String,
    pub save_to_file: bool,
    pub keepalive_enabled: bool,
    pub keepalive_interval_secs: u64,
    pub public_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            ws_path: "/ws".to_string(),
            json_logs: false,
            max_messages: 30,
            history_file: "./messages.json".to_string(),
            save_to_file: true,
            keepalive_enabled: false,
            keepalive_interval_secs: 50,
            public_dir: "./public".to_string(),
        }
    }
}

impl Config {
    /// Resolve config with layered precedence:
    /// built-in defaults < TOML file < env vars (RELAY_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("RELAY_"))
            .merge(Serialized::defaults(cli.clone()))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values no layer is allowed to produce.
    pub fn validate(&self) -> Result<(), figment::Error> {
        if self.max_messages == 0 {
            return Err(figment::Error::from(
                "max_messages must be at least 1".to_string(),
            ));
        }
        if !self.ws_path.starts_with('/') {
            return Err(figment::Error::from(
                "ws_path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# ws-relay configuration
# Place this file at ./relay.toml or specify with --config <path>
# All settings can be overridden via environment variables (RELAY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# WebSocket endpoint path (default: /ws)
# ws_path = "/ws"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Message history ----

# Maximum number of retained messages; the oldest are evicted first
# max_messages = 30

# JSON file the history is mirrored to after every message
# history_file = "./messages.json"

# Set to false to keep history in memory only
# save_to_file = true

# ---- Keepalive ----

# Send the "ping" token to every client on a fixed interval while at least
# one client is connected. Off by default.
# keepalive_enabled = false
# keepalive_interval_secs = 50

# ---- Static web UI ----

# Directory served at the HTTP root
# public_dir = "./public"
"#
    .to_string()
}
