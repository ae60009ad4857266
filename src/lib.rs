//! WebSocket broadcast relay library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod history;
pub mod keepalive;
pub mod routes;
pub mod state;
pub mod ws;
