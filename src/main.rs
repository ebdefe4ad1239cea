use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leito_api_rest::{AppState, router};
use leito_core::{BedService, ConfigValues, CoreConfig, FileStore};

/// Main entry point for the Leito application
///
/// Loads `.env`, opens the file-backed store and serves the REST API
/// (default port 3000, configurable via LEITO_REST_ADDR).
///
/// # Environment Variables
/// - `LEITO_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LEITO_DATA_DIR`: Directory holding the collection files (default: "leito_data")
/// - `LEITO_OPEN_SECTOR_LABELS`: Comma-separated sector type labels treated as open sectors
/// - `LEITO_PROTECTED_MIN_AGE` / `LEITO_PROTECTED_MAX_AGE`: Protected-pathway age bounds
/// - `LEITO_ROOM_PREFIX_LEN`: Bed-code characters shared by a ward room (default: 3)
/// - `RUST_LOG`: Extra tracing directives
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store setup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leito_run=info".parse()?)
                .add_directive("leito_core=info".parse()?)
                .add_directive("leito_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LEITO_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env_values(ConfigValues::from_lookup(|key| {
        std::env::var(key).ok()
    }))?);
    let store = Arc::new(FileStore::open(cfg.data_dir())?);

    tracing::info!("++ Data directory {}", cfg.data_dir().display());
    tracing::info!("++ Starting Leito REST on {}", rest_addr);

    let rest_app = router(AppState {
        service: BedService::new(cfg, store),
    });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, rest_app).await?;

    Ok(())
}
