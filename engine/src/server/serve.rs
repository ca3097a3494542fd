//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::EngineError;
use crate::server::handlers::{
    devices_handler, dispatch_handler, exec_export_handler, exec_status_handler,
    exec_stop_handler, health_handler, presets_handler, reinstall_dispatch_handler,
    reinstall_status_handler, restart_dispatch_handler, restart_status_handler, version_handler,
};
use crate::server::state::ServerState;

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), EngineError>>, EngineError> {
    let app = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Fleet and presets
        .route("/devices", get(devices_handler))
        .route("/presets", get(presets_handler))
        // Dispatch and tracking
        .route("/dispatch", post(dispatch_handler))
        .route("/exec/{id}", get(exec_status_handler))
        .route("/exec/{id}/export", get(exec_export_handler))
        .route("/exec/{id}/stop", post(exec_stop_handler))
        // Orchestrations
        .route("/restart", post(restart_dispatch_handler))
        .route("/restart/{id}", get(restart_status_handler))
        .route("/reinstall", post(reinstall_dispatch_handler))
        .route("/reinstall/{id}", get(reinstall_status_handler))
        // State and middleware
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| EngineError::ServerError(e.to_string()))
    });

    Ok(handle)
}
