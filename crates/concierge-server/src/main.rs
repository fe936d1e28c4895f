//! Concierge server - HTTP gateway for the domain support models

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use concierge_core::{DeviceSelector, EngineConfig, HubModelSource, ModelRegistry, ServerConfig};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "concierge_server=debug,concierge_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Concierge server");

    let engine_config = EngineConfig::load()?;
    let server_config = ServerConfig::default();
    info!("Model cache directory: {:?}", engine_config.cache_dir);

    // Models load sequentially before the listener binds.
    let registry = tokio::task::spawn_blocking(move || {
        let device = DeviceSelector::detect_with_preference(engine_config.device.as_deref());
        let source = HubModelSource::new(&engine_config);
        let mut registry = ModelRegistry::new(device, engine_config.model_specs());
        let report = registry.load_all(&source);
        (registry, report)
    })
    .await;
    let (registry, report) = registry?;

    if report.all_loaded() {
        info!("All {} models loaded", report.loaded.len());
    } else {
        warn!(
            "Loaded {} models, {} unavailable: {:?}",
            report.loaded.len(),
            report.failed.len(),
            report.failed
        );
    }

    let state = AppState::new(Arc::new(registry), &server_config);
    let app = api::create_router(state);

    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
