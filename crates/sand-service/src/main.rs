//! SAND Service
//!
//! Reference HTTP service whose API routes require a bearer token that the
//! SAND authorization server verifies for this service's resource.

use sand::middleware::VerifyState;
use sand::service::Service;
use sand_service::config::Config;
use sand_service::{observability, routes};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sand=debug,sand_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SAND service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        resource = %config.service.resource,
        token_site = %config.service.client.token_site,
        "Configuration loaded successfully"
    );

    // Metrics recorder must exist before the first token request
    let metrics_handle = observability::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let service = Service::from_config(&config.service).map_err(|e| {
        error!("Failed to build SAND service: {}", e);
        e
    })?;

    let verify_state = Arc::new(VerifyState::new(
        service,
        config.protected_scopes.clone(),
        config.protected_action.clone(),
    ));

    let app = routes::build_routes(verify_state, metrics_handle);

    info!("SAND service listening on {}", config.bind_address);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("SAND service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
