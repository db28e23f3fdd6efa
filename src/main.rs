use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayledger::config::Config;
use stayledger::http::{AppState, router};
use stayledger::service::{AvailabilityService, ServiceOptions};
use stayledger::store::{InMemoryStore, PropertyStore, WalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env();
    stayledger::observability::init(config.metrics_port)?;

    let store: Arc<dyn PropertyStore> = if config.in_memory {
        Arc::new(InMemoryStore::new())
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        let wal_store = Arc::new(WalStore::open(&config.wal_path())?);
        let compactor_store = wal_store.clone();
        let threshold = config.compact_threshold;
        tokio::spawn(async move {
            stayledger::compactor::run_compactor(compactor_store, threshold).await;
        });
        wal_store
    };

    let options = ServiceOptions {
        require_client_name: config.require_client_name,
    };
    let service = Arc::new(AvailabilityService::new(store, options));
    let app = router(AppState::new(service.clone()));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("stayledger listening on {addr}");
    info!(
        "  storage: {}",
        if config.in_memory {
            "in-memory".to_string()
        } else {
            config.wal_path().display().to_string()
        }
    );
    info!(
        "  properties: {} ({} active)",
        service.property_count(),
        service.active_property_count()
    );
    info!("  require_client_name: {}", config.require_client_name);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("stayledger stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM. In-flight requests are drained by axum.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining in-flight requests");
}
