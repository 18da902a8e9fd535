//! Gatehouse gateway process.
//!
//! Reads `GATEHOUSE_*` settings (from the environment or a `.env` file),
//! opens the SQLite store, picks a session store (Redis when
//! `GATEHOUSE_REDIS_URL` is set, process memory otherwise), and serves
//! the WebSocket gateway until Ctrl+C or SIGTERM.

use gatehouse::{AuthService, GatehouseConfig, GatehouseError, GatehouseServerBuilder};
use gatehouse_session::{MemorySessionStore, RedisSessionStore, SessionStore};
use gatehouse_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), GatehouseError> {
    // A missing .env file is fine; real deployments set the variables.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatehouseConfig::from_env()?;
    tracing::info!(
        bind = %config.server.bind_addr,
        database = %config.database_url,
        shared_sessions = config.redis_url.is_some(),
        ttl_secs = config.session.ttl.as_secs(),
        max_characters = config.auth.max_characters,
        "configuration loaded"
    );

    let store = SqliteStore::connect(&config.database_url).await?;

    match &config.redis_url {
        Some(url) => {
            let sessions = RedisSessionStore::connect(url, config.session.clone()).await?;
            serve(&config, store, sessions).await
        }
        None => {
            let sessions = MemorySessionStore::new(config.session.clone());
            serve(&config, store, sessions).await
        }
    }
}

async fn serve<S: SessionStore>(
    config: &GatehouseConfig,
    store: SqliteStore,
    sessions: S,
) -> Result<(), GatehouseError> {
    let service = AuthService::new(store, sessions).with_config(config.auth.clone());

    let server = GatehouseServerBuilder::from_config(&config.server)
        .build(service)
        .await?;

    server.run_until(shutdown_signal()).await
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
