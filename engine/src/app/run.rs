//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::app::options::{AppOptions, CollaboratorOptions};
use crate::engine::FleetEngine;
use crate::errors::EngineError;
use crate::http::client::HttpClient;
use crate::http::push::HttpPushChannel;
use crate::http::registry::HttpDeviceRegistry;
use crate::http::shell::HttpShellChannel;
use crate::http::store::HttpExecutionStore;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the drover engine
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), EngineError> {
    info!("Initializing drover engine...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let engine = init_engine(&options)?;

    let state = Arc::new(ServerState::new(engine.clone()));
    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.server, state, async move {
        let _ = server_shutdown_rx.recv().await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    // Stop every active poll task, then drain the server
    let _ = shutdown_tx.send(());
    engine.shutdown().await;

    match server_handle.await {
        Ok(result) => result,
        Err(e) => Err(EngineError::ServerError(e.to_string())),
    }
}

fn init_engine(options: &AppOptions) -> Result<Arc<FleetEngine>, EngineError> {
    let registry = Arc::new(HttpDeviceRegistry::new(client_for(&options.registry)?));
    let push = Arc::new(HttpPushChannel::new(client_for(&options.push)?));
    let shell = Arc::new(HttpShellChannel::new(client_for(&options.shell)?));
    let store = Arc::new(HttpExecutionStore::new(client_for(&options.store)?));

    Ok(FleetEngine::new(
        registry,
        push,
        shell,
        store,
        options.engine.clone(),
    ))
}

fn client_for(options: &CollaboratorOptions) -> Result<Arc<HttpClient>, EngineError> {
    Ok(Arc::new(HttpClient::new(
        &options.base_url,
        options.api_token.clone(),
    )?))
}
