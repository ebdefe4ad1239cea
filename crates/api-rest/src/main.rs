//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `leito-run` binary loads a
//! `.env` file first and then serves the same router.

use leito_api_rest::{router, AppState};
use leito_core::{BedService, ConfigValues, CoreConfig, FileStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Leito REST API server
///
/// # Environment Variables
/// - `LEITO_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `LEITO_DATA_DIR`: Directory holding the collection files
/// - `LEITO_OPEN_SECTOR_LABELS`: Comma-separated sector type labels treated as open sectors
/// - `LEITO_PROTECTED_MIN_AGE` / `LEITO_PROTECTED_MAX_AGE`: Protected-pathway age bounds
/// - `LEITO_ROOM_PREFIX_LEN`: Bed-code characters shared by a ward room (default: 3)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the data directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leito_api_rest=info".parse()?)
                .add_directive("leito_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("LEITO_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env_values(ConfigValues::from_lookup(|key| {
        std::env::var(key).ok()
    }))?);
    let store = Arc::new(FileStore::open(cfg.data_dir())?);

    tracing::info!(
        "-- Starting Leito REST API on {} (data dir {})",
        addr,
        cfg.data_dir().display()
    );

    let app = router(AppState {
        service: BedService::new(cfg, store),
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
