use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use beacon_server::{api, AppState, ServerConfig};
use beacon_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,beacon_server=debug")),
        )
        .init();

    info!("Starting Beacon server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and open the database
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match config.database_path {
        Some(ref path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let http_addr = config.http_addr;
    let state = AppState::new(config, db);

    // -----------------------------------------------------------------------
    // 3. Spawn background sweeps for the in-memory stores
    // -----------------------------------------------------------------------
    let nonces = state.nonces.clone();
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            nonces.purge_expired().await;
            sessions.purge_expired().await;
        }
    });

    // Pending payment references older than an hour are abandoned.
    let payments = state.payments.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            payments.purge_stale(Duration::from_secs(3600)).await;
        }
    });

    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 4. Run the HTTP server until shutdown
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
