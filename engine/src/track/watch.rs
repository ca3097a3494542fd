//! Active poll task registry

use std::collections::HashMap;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// A running poll task and its cancellation handle
struct PollTask {
    cancel_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Tracks one cancellable polling task per watched id
///
/// Watching is idempotent per id and watching a new id never disturbs
/// unrelated in-flight tasks. Tasks that stop on their own (terminal-state
/// detection) are pruned lazily.
pub struct PollRegistry {
    tasks: Mutex<HashMap<String, PollTask>>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a live task is watching this id
    pub async fn contains(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.get(id) {
            Some(task) if task.handle.is_finished() => {
                tasks.remove(id);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Register a spawned task under an id
    pub async fn register(&self, id: &str, cancel_tx: broadcast::Sender<()>, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.insert(id.to_string(), PollTask { cancel_tx, handle }) {
            // A finished predecessor is replaced; a live one is cancelled
            let _ = previous.cancel_tx.send(());
        }
    }

    /// Stop watching an id
    ///
    /// Returns false when no live task was registered for it.
    pub async fn stop(&self, id: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.remove(id) {
            Some(task) => {
                let live = !task.handle.is_finished();
                let _ = task.cancel_tx.send(());
                debug!("Stopped watching {}", id);
                live
            }
            None => false,
        }
    }

    /// Stop every active task
    pub async fn stop_all(&self) {
        let mut tasks = self.tasks.lock().await;
        for (id, task) in tasks.drain() {
            let _ = task.cancel_tx.send(());
            debug!("Stopped watching {}", id);
        }
    }

    /// Ids with a live poll task
    pub async fn active(&self) -> Vec<String> {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, task| !task.handle.is_finished());
        tasks.keys().cloned().collect()
    }
}

impl Default for PollRegistry {
    fn default() -> Self {
        Self::new()
    }
}
