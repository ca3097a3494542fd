//! Orchestration record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::execution::DeviceResultStatus;

/// Per-device verdict over both phases of an orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pending,
    Ok,
    Error,
}

/// Restart orchestration lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartStatus {
    Running,
    Completed,
    Failed,
    Partial,
    TimedOut,
    Error,
}

impl RestartStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RestartStatus::Running)
    }
}

/// Two-phase state of one device in a restart orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartDeviceState {
    pub device_id: String,
    pub alias: String,
    pub force_stop: DeviceResultStatus,
    pub launch: DeviceResultStatus,
    pub overall: OverallStatus,
}

impl RestartDeviceState {
    /// Ok iff both phases ok; error iff either phase errored; pending otherwise
    pub fn derive_overall(&mut self) {
        self.overall = derive_overall(self.force_stop, self.launch);
    }
}

fn derive_overall(first: DeviceResultStatus, second: DeviceResultStatus) -> OverallStatus {
    if first == DeviceResultStatus::Error || second == DeviceResultStatus::Error {
        OverallStatus::Error
    } else if first == DeviceResultStatus::Ok && second == DeviceResultStatus::Ok {
        OverallStatus::Ok
    } else {
        OverallStatus::Pending
    }
}

/// Aggregate counters for a restart orchestration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RestartStats {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub pending: usize,
}

/// One restart-app orchestration, tracked as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartOrchestration {
    pub restart_id: String,
    pub package_name: String,

    /// Phase 1 execution (force-stop over the shell channel)
    pub stop_exec_id: String,

    /// Phase 2 execution (launch over the push channel, gated per device)
    pub launch_exec_id: String,

    pub created_at: DateTime<Utc>,
    pub status: RestartStatus,
    pub devices: Vec<RestartDeviceState>,
}

impl RestartOrchestration {
    pub fn stats(&self) -> RestartStats {
        let mut stats = RestartStats {
            total: self.devices.len(),
            ..RestartStats::default()
        };
        for device in &self.devices {
            match device.overall {
                OverallStatus::Ok => stats.ok += 1,
                OverallStatus::Error => stats.failed += 1,
                OverallStatus::Pending => stats.pending += 1,
            }
        }
        stats
    }

    /// Derive the orchestration status from the per-device verdicts
    pub fn derive_status(&mut self) {
        if self.devices.iter().any(|d| d.overall == OverallStatus::Pending) {
            self.status = RestartStatus::Running;
            return;
        }
        let errors = self
            .devices
            .iter()
            .filter(|d| d.overall == OverallStatus::Error)
            .count();
        self.status = if errors == 0 {
            RestartStatus::Completed
        } else if errors == self.devices.len() {
            RestartStatus::Failed
        } else {
            RestartStatus::Partial
        };
    }

    /// Close out the orchestration at the deadline
    ///
    /// Devices still incomplete become errors; the orchestration itself
    /// reports `timed_out` rather than a verdict it cannot know.
    pub fn apply_deadline(&mut self) {
        let mut timed_out = false;
        for device in &mut self.devices {
            if device.overall == OverallStatus::Pending {
                device.overall = OverallStatus::Error;
                timed_out = true;
            }
        }
        if timed_out {
            self.status = RestartStatus::TimedOut;
        } else {
            self.derive_status();
        }
    }
}

/// Store linkage between a restart id and its phase executions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartLink {
    pub restart_id: String,
    pub package_name: String,
    pub stop_exec_id: String,
    pub launch_exec_id: String,
    pub created_at: DateTime<Utc>,
}

/// Reinstall orchestration lifecycle status
///
/// Only two terminal outcomes; aggregate success requires every targeted
/// device to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReinstallStatus {
    Pending,
    Ok,
    Failed,
}

impl ReinstallStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReinstallStatus::Pending)
    }
}

/// Two-phase state of one device in a reinstall orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinstallDeviceState {
    pub device_id: String,
    pub alias: String,
    pub reinstall: DeviceResultStatus,
    pub launch: DeviceResultStatus,
    pub status: ReinstallStatus,
}

impl ReinstallDeviceState {
    pub fn derive_status(&mut self) {
        self.status = match derive_overall(self.reinstall, self.launch) {
            OverallStatus::Ok => ReinstallStatus::Ok,
            OverallStatus::Error => ReinstallStatus::Failed,
            OverallStatus::Pending => ReinstallStatus::Pending,
        };
    }
}

/// Aggregate counters for a reinstall orchestration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReinstallStats {
    pub ok: usize,
    pub failed: usize,
    pub pending: usize,
}

/// One reinstall-and-launch orchestration, tracked as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinstallOrchestration {
    pub exec_id: String,
    pub package_name: String,

    /// Phase 1 execution (reinstall over the push channel)
    pub reinstall_exec_id: String,

    /// Phase 2 execution (launch over the push channel, gated per device)
    pub launch_exec_id: String,

    pub created_at: DateTime<Utc>,
    pub status: ReinstallStatus,
    pub devices: Vec<ReinstallDeviceState>,
}

impl ReinstallOrchestration {
    pub fn stats(&self) -> ReinstallStats {
        let mut stats = ReinstallStats::default();
        for device in &self.devices {
            match device.status {
                ReinstallStatus::Ok => stats.ok += 1,
                ReinstallStatus::Failed => stats.failed += 1,
                ReinstallStatus::Pending => stats.pending += 1,
            }
        }
        stats
    }

    /// Derive the orchestration status from the per-device verdicts
    pub fn derive_status(&mut self) {
        if self.devices.iter().any(|d| d.status == ReinstallStatus::Pending) {
            self.status = ReinstallStatus::Pending;
            return;
        }
        let failed = self
            .devices
            .iter()
            .any(|d| d.status == ReinstallStatus::Failed);
        self.status = if failed {
            ReinstallStatus::Failed
        } else {
            ReinstallStatus::Ok
        };
    }

    /// Close out the orchestration at the deadline; incomplete devices fail
    pub fn apply_deadline(&mut self) {
        for device in &mut self.devices {
            if device.status == ReinstallStatus::Pending {
                device.status = ReinstallStatus::Failed;
            }
        }
        self.derive_status();
    }
}

/// Store linkage between a reinstall id and its phase executions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinstallLink {
    pub exec_id: String,
    pub package_name: String,
    pub reinstall_exec_id: String,
    pub launch_exec_id: String,
    pub created_at: DateTime<Utc>,
}
