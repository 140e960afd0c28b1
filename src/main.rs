//! # Session Server
//!
//! A WebSocket session server with reconnection continuity and bounded
//! graceful shutdown.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Session state store (Redis or in-memory)
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use session_server::config::Settings;
use session_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    session_server::telemetry::init_tracing();

    info!("Starting Session Server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        backend = ?settings.store.backend,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;

    info!("Session Server stopped");
    Ok(())
}
