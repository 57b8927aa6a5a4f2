//! Tabletop session host binary.
//!
//! Composition root: configuration from the environment, logging, runtime
//! assembly via [`HostBuilder`], then the [`Host`] loop until Ctrl-C.
//!
//! ```bash
//! TABLETOP_MAP_PATH=maps/crossroads.ron TABLETOP_PERSISTENCE=1 cargo run -p tabletop-client
//! ```

use anyhow::Result;
use client_bootstrap::{HostBuilder, HostConfig, logging};
use tabletop_client::Host;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = HostConfig::from_env();
    let session_id = config.session_id_or_generate();
    config.session_id = Some(session_id.clone());

    let _log_guard = logging::setup_logging(&session_id)?;

    tracing::info!("Starting tabletop host");
    tracing::info!("Session ID: {}", session_id);
    tracing::info!("Persistence: {}", config.enable_persistence);
    if let Some(path) = &config.map_path {
        tracing::info!("Map: {}", path.display());
    }

    let setup = HostBuilder::new(config).build().await?;
    let snapshot = setup.runtime.handle().refresh().await?;
    tracing::info!(
        revision = snapshot.revision,
        tokens = snapshot.map().token_count(),
        "Session ready"
    );

    Host::new(setup.runtime)
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    tracing::info!("Host shutdown complete");
    Ok(())
}
