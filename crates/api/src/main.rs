//! `practice-api`: practice-management API host with field-level encryption.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Decode the key material and build the cipher engine.
//! 4. Attach the write hook (record store) and the read interceptor (router).
//! 5. Bind the listener and serve.

mod config;
mod models;
mod server;
mod store;
mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use fieldcrypt::{CipherEngine, FieldRegistry, FieldShield};
use tracing::info;

use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        iv_mode = cfg.iv_mode.as_str(),
        "practice-api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Cipher engine
    // -----------------------------------------------------------------------
    let secret = cfg.secret_material().map_err(|e| {
        tracing::error!(error = %e, "encryption key material rejected");
        e
    })?;
    let engine = CipherEngine::new(&secret, cfg.iv_mode)?;
    drop(secret);

    let registry = FieldRegistry::standard();
    info!(sensitive_fields = registry.len(), "cipher engine ready");
    let shield = FieldShield::new(Arc::new(engine), registry);

    // -----------------------------------------------------------------------
    // 4. Hooks + router
    // -----------------------------------------------------------------------
    let state = AppState::new(shield, cfg.excluded_paths(), cfg.iv_mode)
        .with_max_response_bytes(cfg.max_response_bytes);
    let router = server::router::build(state);

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
