//! HTTP surface for NR12 checklists.
//!
//! Serves the QR targets (`/chk`, `/eq`, `/bot/op`), the bulk web
//! submission, QR generation, alert administration and the QR images.

mod config;
mod error;
mod routes;
mod state;

use database::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting admin web server");

    // Connect to database
    let db = Database::connect(&config.engine.sqlite_url).await?;
    db.migrate().await?;

    // Build application
    let app = routes::app(AppState::new(db.clone(), config.engine));

    // Start server
    info!(addr = %config.addr, "Admin web server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    db.close().await;
    info!("Admin web server stopped");
    Ok(())
}
