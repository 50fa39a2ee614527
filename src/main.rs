//! endpointd - Endpoint record service
//!
//! Serves endpoint records from PostgreSQL over a length-prefixed binary
//! protocol on mutually authenticated TLS.

use endpointd_server::{tls, Config, Server, ServerConfig, StorageBackend};
use endpointd_store::{EndpointStore, MemoryEndpointStore, PgEndpointStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if ENDPOINTD_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("ENDPOINTD_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Starting endpointd server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max frame size: {} bytes", config.network.max_frame_size);

    let tls_acceptor = tls::create_tls_acceptor(&config.tls)?;
    tracing::info!("  mTLS: enabled (client certificate required)");

    let store: Arc<dyn EndpointStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let store = PgEndpointStore::connect(
                &config.storage.database_url,
                config.storage.max_connections,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
            if config.storage.run_migrations {
                store.migrate().await?;
            }
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; records are lost on restart");
            Arc::new(MemoryEndpointStore::new())
        }
    };

    store.ping().await.map_err(|e| {
        tracing::error!("Store health check failed: {}", e);
        e
    })?;
    tracing::info!("  Store: {} (reachable)", store.backend());

    let server_config = ServerConfig::new(config.network.bind_addr, tls_acceptor)
        .with_max_frame_size(config.network.max_frame_size);
    let server = Arc::new(Server::new(server_config, store));

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.close().await;
    });

    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
