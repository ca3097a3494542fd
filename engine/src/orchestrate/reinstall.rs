//! Reinstall-and-launch orchestration controller

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::channels::ExecutionStore;
use crate::command::compose::CommandPayload;
use crate::command::presets::FcmPreset;
use crate::dispatch::dispatcher::Dispatcher;
use crate::errors::EngineError;
use crate::models::device::{Device, TargetSpec};
use crate::models::execution::{
    DeviceResultStatus, DispatchMode, ExecutionRecord, ExecutionSnapshot,
};
use crate::models::orchestration::{
    ReinstallDeviceState, ReinstallLink, ReinstallOrchestration, ReinstallStatus,
};
use crate::orchestrate::Options;
use crate::track::tracker::merge_snapshot;
use crate::utils::generate_uuid;

/// Locally observed state of one reinstall orchestration
struct ActiveReinstall {
    orch: ReinstallOrchestration,
    reinstall_record: ExecutionRecord,
    launch_record: ExecutionRecord,
    started: Instant,
}

/// Sequences reinstall then launch per device, both over the push channel
///
/// One logical job per device set with only two terminal outcomes; aggregate
/// success requires every targeted device to succeed.
pub struct ReinstallController {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn ExecutionStore>,
    options: Options,
    managed_package: String,
    active: RwLock<HashMap<String, ActiveReinstall>>,
}

impl ReinstallController {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn ExecutionStore>,
        options: Options,
        managed_package: String,
    ) -> Self {
        Self {
            dispatcher,
            store,
            options,
            managed_package,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve requested device ids against the live fleet
    ///
    /// Unknown ids are dropped silently, mirroring alias resolution.
    pub async fn resolve(&self, device_ids: &[String]) -> Result<Vec<Device>, EngineError> {
        let fleet = self.dispatcher.resolve_targets(&TargetSpec::All).await?;
        let wanted: HashSet<&str> = device_ids.iter().map(String::as_str).collect();
        Ok(fleet
            .into_iter()
            .filter(|d| wanted.contains(d.id.as_str()))
            .collect())
    }

    /// Dispatch phase 1 and register the gated phase 2
    pub async fn dispatch(
        &self,
        device_ids: &[String],
        created_by: &str,
    ) -> Result<ReinstallOrchestration, EngineError> {
        let targets = self.resolve(device_ids).await?;
        if targets.is_empty() {
            return Err(EngineError::ValidationError(
                "no devices match the requested ids".to_string(),
            ));
        }

        let reinstall_payload = CommandPayload::Fcm(json!({
            "command": "reinstall_app",
            "package": self.managed_package,
        }));
        let reinstall_record = self
            .dispatcher
            .dispatch_to(targets.clone(), &reinstall_payload, created_by)
            .await?;
        let launch_record = self
            .dispatcher
            .register(DispatchMode::Fcm, targets.clone(), created_by)
            .await?;

        let link = ReinstallLink {
            exec_id: generate_uuid(),
            package_name: self.managed_package.clone(),
            reinstall_exec_id: reinstall_record.exec_id.clone(),
            launch_exec_id: launch_record.exec_id.clone(),
            created_at: Utc::now(),
        };
        self.store.create_reinstall(&link).await.map_err(|e| {
            EngineError::DispatchError(format!("failed to create reinstall record: {}", e))
        })?;

        let mut orch = ReinstallOrchestration {
            exec_id: link.exec_id.clone(),
            package_name: link.package_name.clone(),
            reinstall_exec_id: link.reinstall_exec_id.clone(),
            launch_exec_id: link.launch_exec_id.clone(),
            created_at: link.created_at,
            status: ReinstallStatus::Pending,
            devices: device_states(&targets, &reinstall_record, &launch_record),
        };
        orch.derive_status();

        info!(
            "Reinstall {} of {} dispatched to {} devices",
            orch.exec_id,
            orch.package_name,
            orch.devices.len()
        );

        self.active.write().await.insert(
            link.exec_id.clone(),
            ActiveReinstall {
                orch: orch.clone(),
                reinstall_record,
                launch_record,
                started: Instant::now(),
            },
        );

        Ok(orch)
    }

    /// Run the bounded poll loop for one reinstall id
    pub async fn run_poll<S, F>(
        self: Arc<Self>,
        exec_id: String,
        sleep_fn: S,
        mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) where
        S: Fn(std::time::Duration) -> F,
        F: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Reinstall poller for {} shutting down...", exec_id);
                    return;
                }
                _ = sleep_fn(self.options.poll_interval) => {
                    // Continue with poll
                }
            }

            if self.deadline_reached(&exec_id).await {
                return;
            }

            match self.step(&exec_id).await {
                Ok(status) if status.is_terminal() => {
                    info!("Reinstall {} reached {:?}, stopping poll", exec_id, status);
                    return;
                }
                Ok(_) => {}
                Err(EngineError::NotFound(_)) => return,
                Err(e) => {
                    error!("Reinstall poll for {} failed: {}", exec_id, e);
                }
            }
        }
    }

    async fn deadline_reached(&self, exec_id: &str) -> bool {
        let mut active = self.active.write().await;
        let Some(entry) = active.get_mut(exec_id) else {
            return true;
        };
        if entry.started.elapsed() < self.options.timeout {
            return false;
        }
        entry.orch.apply_deadline();
        info!(
            "Reinstall {} hit the {}s deadline with status {:?}",
            exec_id,
            self.options.timeout.as_secs(),
            entry.orch.status
        );
        true
    }

    /// One poll tick: refresh both phases, dispatch gated launches, rederive
    async fn step(&self, exec_id: &str) -> Result<ReinstallStatus, EngineError> {
        let mut active = self.active.write().await;
        let entry = active
            .get_mut(exec_id)
            .ok_or_else(|| EngineError::NotFound(exec_id.to_string()))?;

        let (reinstall_snap, launch_snap) = futures::future::try_join(
            self.store.fetch_execution(&entry.orch.reinstall_exec_id),
            self.store.fetch_execution(&entry.orch.launch_exec_id),
        )
        .await?;
        merge_snapshot(&mut entry.reinstall_record, &reinstall_snap);
        merge_snapshot(&mut entry.launch_record, &launch_snap);

        let ready: Vec<String> = entry
            .reinstall_record
            .results
            .iter()
            .filter(|r| r.status == DeviceResultStatus::Ok)
            .filter(|r| {
                entry
                    .launch_record
                    .result(&r.device_id)
                    .map(|l| l.status == DeviceResultStatus::Pending)
                    .unwrap_or(false)
            })
            .map(|r| r.device_id.clone())
            .collect();
        if !ready.is_empty() {
            let launch_payload = CommandPayload::Fcm(
                FcmPreset::LaunchApp {
                    package: entry.orch.package_name.clone(),
                }
                .payload(),
            );
            for device_id in &ready {
                self.dispatcher
                    .send_one(&mut entry.launch_record, device_id, &launch_payload)
                    .await;
            }
        }

        for device in &mut entry.orch.devices {
            device.reinstall = phase_status(&entry.reinstall_record, &device.device_id);
            device.launch = phase_status(&entry.launch_record, &device.device_id);
            device.derive_status();
        }
        entry.orch.derive_status();
        Ok(entry.orch.status)
    }

    /// Current orchestration view, recovered from the store when not local
    pub async fn status(&self, exec_id: &str) -> Result<ReinstallOrchestration, EngineError> {
        if let Some(entry) = self.active.read().await.get(exec_id) {
            return Ok(entry.orch.clone());
        }

        let link = self.store.fetch_reinstall(exec_id).await?;
        let (reinstall_snap, launch_snap) = futures::future::try_join(
            self.store.fetch_execution(&link.reinstall_exec_id),
            self.store.fetch_execution(&link.launch_exec_id),
        )
        .await?;

        let mut orch = ReinstallOrchestration {
            exec_id: link.exec_id,
            package_name: link.package_name,
            reinstall_exec_id: link.reinstall_exec_id,
            launch_exec_id: link.launch_exec_id,
            created_at: link.created_at,
            status: ReinstallStatus::Pending,
            devices: recovered_device_states(&reinstall_snap, &launch_snap),
        };
        orch.derive_status();
        Ok(orch)
    }
}

fn device_states(
    targets: &[Device],
    reinstall_record: &ExecutionRecord,
    launch_record: &ExecutionRecord,
) -> Vec<ReinstallDeviceState> {
    targets
        .iter()
        .map(|device| {
            let mut state = ReinstallDeviceState {
                device_id: device.id.clone(),
                alias: device.alias.clone(),
                reinstall: phase_status(reinstall_record, &device.id),
                launch: phase_status(launch_record, &device.id),
                status: ReinstallStatus::Pending,
            };
            state.derive_status();
            state
        })
        .collect()
}

fn recovered_device_states(
    reinstall_snap: &ExecutionSnapshot,
    launch_snap: &ExecutionSnapshot,
) -> Vec<ReinstallDeviceState> {
    reinstall_snap
        .results
        .iter()
        .map(|result| {
            let launch = launch_snap
                .results
                .iter()
                .find(|l| l.device_id == result.device_id)
                .map(|l| l.status)
                .unwrap_or(DeviceResultStatus::Pending);
            let mut state = ReinstallDeviceState {
                device_id: result.device_id.clone(),
                alias: result.alias.clone(),
                reinstall: result.status,
                launch,
                status: ReinstallStatus::Pending,
            };
            state.derive_status();
            state
        })
        .collect()
}

fn phase_status(record: &ExecutionRecord, device_id: &str) -> DeviceResultStatus {
    record
        .result(device_id)
        .map(|r| r.status)
        .unwrap_or(DeviceResultStatus::Pending)
}
