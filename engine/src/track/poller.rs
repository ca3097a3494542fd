//! Polling worker for a single execution

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::channels::ExecutionStore;
use crate::track::tracker::ExecutionTracker;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Fixed polling interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

/// Run the poll loop for one execution id
///
/// Stops the instant the tracked record reaches a terminal status, when the
/// record disappears locally, or when the shutdown signal fires. Fetch errors
/// are logged and the loop keeps polling; there is no deadline at this layer.
pub async fn run<S, F>(
    options: &Options,
    exec_id: &str,
    store: Arc<dyn ExecutionStore>,
    tracker: Arc<ExecutionTracker>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    debug!("Execution poller starting for {}", exec_id);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                debug!("Execution poller for {} shutting down...", exec_id);
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with poll
            }
        }

        match store.fetch_execution(exec_id).await {
            Ok(snapshot) => match tracker.apply_snapshot(exec_id, &snapshot).await {
                Some(status) if status.is_terminal() => {
                    info!("Execution {} reached {:?}, stopping poll", exec_id, status);
                    return;
                }
                Some(_) => {}
                None => {
                    debug!("Execution {} no longer tracked, stopping poll", exec_id);
                    return;
                }
            },
            Err(e) => {
                error!("Failed to fetch execution {}: {}", exec_id, e);
            }
        }
    }
}
