mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use eon_api::AppStateInner;
use eon_backend::{Connector, MemoryBackend, RestConnector};
use eon_db::Database;

use config::{BackendConfig, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "eon=debug,eon_api=debug,eon_client=debug,eon_backend=debug,eon_db=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::load()?;

    // Device storage
    let db = Arc::new(Database::open(&config.device_db_path)?);

    // Backend
    let connector: Arc<dyn Connector> = match &config.backend {
        BackendConfig::Memory { jwt_secret } => {
            info!("Using in-memory backend");
            Arc::new(MemoryBackend::new(jwt_secret.clone()))
        }
        BackendConfig::Rest { url, anon_key } => {
            info!("Using hosted backend at {}", url);
            Arc::new(RestConnector::new(url, anon_key)?)
        }
    };

    let state = AppStateInner::new(connector, db, config.max_selections);

    // Close idle device sessions (checked every minute)
    tokio::spawn(eon_api::cleanup::run_sweep_loop(
        state.clone(),
        Duration::from_secs(60),
        config.device_idle,
    ));

    let app = eon_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("EON server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
