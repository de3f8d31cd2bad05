//! Debug HTTP server, compiled only with the `debug_http` feature.
//!
//! Exposes a running session over a small Axum router: health, the latest
//! snapshot, telemetry, an SSE stream of session events and two control
//! endpoints. Every route requires the debug token.

mod routes;
mod sse;

use std::net::SocketAddr;

pub use routes::{build_router, run_http_server, DebugHttpState, HttpServerError};

/// Default bind address when `NECK_TRAINER_DEBUG_HTTP_ADDR` is unset or invalid
pub const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8787);

/// Bind address from the environment
pub fn addr_from_env() -> SocketAddr {
    std::env::var("NECK_TRAINER_DEBUG_HTTP_ADDR")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(DEFAULT_ADDR))
}

/// Debug token from the environment
pub fn token_from_env() -> String {
    std::env::var("NECK_TRAINER_DEBUG_TOKEN").unwrap_or_else(|_| "neck-trainer-debug".to_string())
}
