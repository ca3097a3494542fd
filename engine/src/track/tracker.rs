//! Execution state tracking and snapshot merging

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::execution::{ExecutionRecord, ExecutionSnapshot, ExecutionStatus};

/// Merge a store snapshot into the local record, forward-only
///
/// Results regress never: a stale poll response ranking below the local state
/// is dropped per device. Device ids outside the frozen target snapshot are
/// ignored. The record status is monotonic; once terminal it stays terminal.
pub fn merge_snapshot(record: &mut ExecutionRecord, snapshot: &ExecutionSnapshot) {
    for incoming in &snapshot.results {
        if let Some(local) = record.result_mut(&incoming.device_id) {
            local.merge(incoming);
        }
    }
    record.refresh_stats();

    if record.status == ExecutionStatus::Running {
        if snapshot.status.is_terminal() {
            record.status = snapshot.status;
        } else if record.stats.total > 0
            && record.results.iter().all(|r| r.status.is_terminal())
        {
            // The backend normally drives completion; this covers a store
            // that has not yet rolled up a record whose results can no
            // longer change.
            record.status = if record.stats.errors == record.stats.total {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Completed
            };
        }
    }
}

/// Client-side view over all locally observed executions
pub struct ExecutionTracker {
    records: RwLock<HashMap<String, ExecutionRecord>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, record: ExecutionRecord) {
        self.records
            .write()
            .await
            .insert(record.exec_id.clone(), record);
    }

    pub async fn get(&self, exec_id: &str) -> Option<ExecutionRecord> {
        self.records.read().await.get(exec_id).cloned()
    }

    /// Merge a snapshot into the tracked record
    ///
    /// Returns the resulting status, or `None` when the id is not tracked
    /// locally. Safe for concurrent observers of the same id.
    pub async fn apply_snapshot(
        &self,
        exec_id: &str,
        snapshot: &ExecutionSnapshot,
    ) -> Option<ExecutionStatus> {
        let mut records = self.records.write().await;
        let record = records.get_mut(exec_id)?;
        merge_snapshot(record, snapshot);
        Some(record.status)
    }
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}
