//! GridSync server entry point.
//!
//! Loads configuration, opens the grid store (`PostgreSQL` when a database
//! URL is configured, otherwise in memory), and serves the request/response
//! and streaming channels until `Ctrl-C`.

use std::sync::Arc;

use gridsync_db::{GridStore, MemoryGridStore, PgGridStore};
use gridsync_server::config::LoggingConfig;
use gridsync_server::{AppState, ServiceConfig, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the store, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ServiceConfig::load()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        http_port = config.http.port,
        stream_port = config.stream.port,
        republish_reads = config.sync.republish_reads,
        subscriber_buffer = config.sync.subscriber_buffer,
        "Configuration loaded"
    );

    // 3. Open the grid store.
    let store: Arc<dyn GridStore> = match config.database.pg_settings() {
        Some(settings) => Arc::new(PgGridStore::connect(&settings).await?),
        None => {
            warn!("No database URL configured, grid state will not survive a restart");
            Arc::new(MemoryGridStore::new())
        }
    };

    // 4. Serve both channels.
    let state = Arc::new(AppState::new(store, &config.sync));
    start_server(&config, state).await?;

    info!("gridsync-server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
