//! Execution record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::device::Device;
use crate::utils::generate_uuid;

/// Delivery channel for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Fcm,
    Shell,
}

/// Per-device result status
///
/// Moves forward only along `pending < sent < {ok, error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceResultStatus {
    Pending,
    Sent,
    Ok,
    Error,
}

impl DeviceResultStatus {
    /// Position along the forward-only partial order
    pub fn rank(&self) -> u8 {
        match self {
            DeviceResultStatus::Pending => 0,
            DeviceResultStatus::Sent => 1,
            DeviceResultStatus::Ok | DeviceResultStatus::Error => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeviceResultStatus::Ok | DeviceResultStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceResultStatus::Pending => "pending",
            DeviceResultStatus::Sent => "sent",
            DeviceResultStatus::Ok => "ok",
            DeviceResultStatus::Error => "error",
        }
    }
}

/// Execution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Outcome of one command on one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResult {
    pub device_id: String,
    pub alias: String,
    pub status: DeviceResultStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl DeviceResult {
    /// New pending result for a target device
    pub fn pending(device: &Device) -> Self {
        Self {
            device_id: device.id.clone(),
            alias: device.alias.clone(),
            status: DeviceResultStatus::Pending,
            exit_code: None,
            output: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Mark the command as submitted to the delivery channel
    pub fn mark_sent(&mut self) {
        self.status = DeviceResultStatus::Sent;
        self.updated_at = Utc::now();
    }

    /// Mark a submission failure for this device only
    pub fn mark_error(&mut self, message: String) {
        self.status = DeviceResultStatus::Error;
        self.error = Some(message);
        self.updated_at = Utc::now();
    }

    /// Adopt an incoming result, forward-only
    ///
    /// A stale or out-of-order update whose status ranks below the local one
    /// is dropped; otherwise the incoming fields win.
    pub fn merge(&mut self, incoming: &DeviceResult) {
        if incoming.status.rank() < self.status.rank() {
            return;
        }
        self.status = incoming.status;
        self.exit_code = incoming.exit_code;
        self.output = incoming.output.clone();
        self.error = incoming.error.clone();
        self.updated_at = incoming.updated_at;
    }
}

/// Aggregate counters for an execution
///
/// `sent + pending() == total` holds at every observed instant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecStats {
    pub total: usize,
    pub sent: usize,
    pub acked: usize,
    pub errors: usize,
}

impl ExecStats {
    pub fn from_results(results: &[DeviceResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            if result.status.rank() >= DeviceResultStatus::Sent.rank() {
                stats.sent += 1;
            }
            match result.status {
                DeviceResultStatus::Ok => stats.acked += 1,
                DeviceResultStatus::Error => stats.errors += 1,
                _ => {}
            }
        }
        stats
    }

    pub fn pending(&self) -> usize {
        self.total - self.sent
    }
}

/// The tracked unit of one dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub exec_id: String,
    pub mode: DispatchMode,

    /// Target set frozen at dispatch time; later fleet changes never alter it
    pub targets: Vec<Device>,

    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub status: ExecutionStatus,
    pub stats: ExecStats,
    pub results: Vec<DeviceResult>,
}

impl ExecutionRecord {
    pub fn new(mode: DispatchMode, targets: Vec<Device>, created_by: &str) -> Self {
        let results: Vec<DeviceResult> = targets.iter().map(DeviceResult::pending).collect();
        let stats = ExecStats::from_results(&results);
        Self {
            exec_id: generate_uuid(),
            mode,
            targets,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            status: ExecutionStatus::Running,
            stats,
            results,
        }
    }

    pub fn result_mut(&mut self, device_id: &str) -> Option<&mut DeviceResult> {
        self.results.iter_mut().find(|r| r.device_id == device_id)
    }

    pub fn result(&self, device_id: &str) -> Option<&DeviceResult> {
        self.results.iter().find(|r| r.device_id == device_id)
    }

    pub fn refresh_stats(&mut self) {
        self.stats = ExecStats::from_results(&self.results);
    }
}

/// Store snapshot of an execution's authoritative state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub status: ExecutionStatus,
    pub results: Vec<DeviceResult>,
}
