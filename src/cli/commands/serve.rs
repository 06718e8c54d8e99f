use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::config::initialize_app_state_with_url;
use crate::router::create_router;
use crate::schemas::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Bind the listener and serve the router until Ctrl+C.
pub async fn run_server(state: AppState, bind_address: &str) -> Result<()> {
    tokio::fs::create_dir_all(state.media.root()).await?;
    debug!("Media directory: {}", state.media.root().display());

    trace!("Creating application router");
    let app = create_router(state);

    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("Courier API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}

pub async fn serve(database_url: &str, bind_address: &str) -> Result<()> {
    info!("Courier API starting up");
    debug!("Database URL: {}", database_url);

    let state = initialize_app_state_with_url(database_url).await.map_err(|e| {
        error!("Failed to initialize application state: {}", e);
        e
    })?;

    run_server(state, bind_address).await
}
