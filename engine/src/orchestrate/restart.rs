//! Restart-app orchestration controller

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
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
    OverallStatus, RestartDeviceState, RestartLink, RestartOrchestration, RestartStatus,
};
use crate::orchestrate::Options;
use crate::track::tracker::merge_snapshot;
use crate::utils::generate_uuid;

/// Restart-app dispatch request
#[derive(Debug, Clone)]
pub struct RestartRequest {
    pub package_name: String,
    pub online_only: bool,
    pub scope: RestartScope,
    pub aliases: Vec<String>,
}

/// Target scope for a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartScope {
    All,
    Aliases,
}

/// Locally observed state of one restart orchestration
struct ActiveRestart {
    orch: RestartOrchestration,
    stop_record: ExecutionRecord,
    launch_record: ExecutionRecord,
    started: Instant,
}

/// Sequences force-stop (shell) then launch (push) per device
///
/// The shell channel carries the stop for reliability; the launch goes over
/// the push channel, which tolerates the app process being dead. A device's
/// launch is dispatched only after its force-stop acknowledges ok.
pub struct RestartController {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn ExecutionStore>,
    options: Options,
    active: RwLock<HashMap<String, ActiveRestart>>,
}

impl RestartController {
    pub fn new(dispatcher: Arc<Dispatcher>, store: Arc<dyn ExecutionStore>, options: Options) -> Self {
        Self {
            dispatcher,
            store,
            options,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Dispatch phase 1 and register the gated phase 2
    pub async fn dispatch(
        &self,
        request: RestartRequest,
        created_by: &str,
    ) -> Result<RestartOrchestration, EngineError> {
        if request.package_name.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "package name must not be empty".to_string(),
            ));
        }

        let spec = match request.scope {
            RestartScope::All => TargetSpec::All,
            RestartScope::Aliases => TargetSpec::Aliases {
                aliases: request.aliases.clone(),
            },
        };
        let mut targets = self.dispatcher.resolve_targets(&spec).await?;
        if request.online_only {
            targets.retain(|d| d.online);
        }
        if targets.is_empty() {
            return Err(EngineError::ValidationError(
                "no devices match the target spec".to_string(),
            ));
        }

        let stop_payload =
            CommandPayload::Shell(format!("am force-stop {}", request.package_name));
        let stop_record = self
            .dispatcher
            .dispatch_to(targets.clone(), &stop_payload, created_by)
            .await?;
        let launch_record = self
            .dispatcher
            .register(DispatchMode::Fcm, targets.clone(), created_by)
            .await?;

        let link = RestartLink {
            restart_id: generate_uuid(),
            package_name: request.package_name.clone(),
            stop_exec_id: stop_record.exec_id.clone(),
            launch_exec_id: launch_record.exec_id.clone(),
            created_at: Utc::now(),
        };
        self.store.create_restart(&link).await.map_err(|e| {
            EngineError::DispatchError(format!("failed to create restart record: {}", e))
        })?;

        let mut orch = RestartOrchestration {
            restart_id: link.restart_id.clone(),
            package_name: link.package_name.clone(),
            stop_exec_id: link.stop_exec_id.clone(),
            launch_exec_id: link.launch_exec_id.clone(),
            created_at: link.created_at,
            status: RestartStatus::Running,
            devices: device_states(&targets, &stop_record, &launch_record),
        };
        orch.derive_status();

        info!(
            "Restart {} of {} dispatched to {} devices",
            orch.restart_id,
            orch.package_name,
            orch.devices.len()
        );

        self.active.write().await.insert(
            link.restart_id.clone(),
            ActiveRestart {
                orch: orch.clone(),
                stop_record,
                launch_record,
                started: Instant::now(),
            },
        );

        Ok(orch)
    }

    /// Run the bounded poll loop for one restart id
    ///
    /// Stops on terminal status, on the hard deadline, or on the shutdown
    /// signal. After the deadline no further poll requests are issued.
    pub async fn run_poll<S, F>(
        self: Arc<Self>,
        restart_id: String,
        sleep_fn: S,
        mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) where
        S: Fn(std::time::Duration) -> F,
        F: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Restart poller for {} shutting down...", restart_id);
                    return;
                }
                _ = sleep_fn(self.options.poll_interval) => {
                    // Continue with poll
                }
            }

            if self.deadline_reached(&restart_id).await {
                return;
            }

            match self.step(&restart_id).await {
                Ok(status) if status.is_terminal() => {
                    info!("Restart {} reached {:?}, stopping poll", restart_id, status);
                    return;
                }
                Ok(_) => {}
                Err(EngineError::NotFound(_)) => return,
                Err(e) => {
                    error!("Restart poll for {} failed: {}", restart_id, e);
                }
            }
        }
    }

    async fn deadline_reached(&self, restart_id: &str) -> bool {
        let mut active = self.active.write().await;
        let Some(entry) = active.get_mut(restart_id) else {
            return true;
        };
        if entry.started.elapsed() < self.options.timeout {
            return false;
        }
        entry.orch.apply_deadline();
        info!(
            "Restart {} hit the {}s deadline with status {:?}",
            restart_id,
            self.options.timeout.as_secs(),
            entry.orch.status
        );
        true
    }

    /// One poll tick: refresh both phases, dispatch gated launches, rederive
    async fn step(&self, restart_id: &str) -> Result<RestartStatus, EngineError> {
        let mut active = self.active.write().await;
        let entry = active
            .get_mut(restart_id)
            .ok_or_else(|| EngineError::NotFound(restart_id.to_string()))?;

        let (stop_snap, launch_snap) = futures::future::try_join(
            self.store.fetch_execution(&entry.orch.stop_exec_id),
            self.store.fetch_execution(&entry.orch.launch_exec_id),
        )
        .await?;
        merge_snapshot(&mut entry.stop_record, &stop_snap);
        merge_snapshot(&mut entry.launch_record, &launch_snap);

        // Phase 2 is gated per device on phase 1 acknowledging ok
        let ready: Vec<String> = entry
            .stop_record
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
            device.force_stop = phase_status(&entry.stop_record, &device.device_id);
            device.launch = phase_status(&entry.launch_record, &device.device_id);
            device.derive_overall();
        }
        entry.orch.derive_status();
        Ok(entry.orch.status)
    }

    /// Current orchestration view
    ///
    /// Falls back to the store when the id is not observed locally (for
    /// example after a process restart); the recovered view carries no local
    /// deadline.
    pub async fn status(&self, restart_id: &str) -> Result<RestartOrchestration, EngineError> {
        if let Some(entry) = self.active.read().await.get(restart_id) {
            return Ok(entry.orch.clone());
        }

        let link = self.store.fetch_restart(restart_id).await?;
        let (stop_snap, launch_snap) = futures::future::try_join(
            self.store.fetch_execution(&link.stop_exec_id),
            self.store.fetch_execution(&link.launch_exec_id),
        )
        .await?;

        let mut orch = RestartOrchestration {
            restart_id: link.restart_id,
            package_name: link.package_name,
            stop_exec_id: link.stop_exec_id,
            launch_exec_id: link.launch_exec_id,
            created_at: link.created_at,
            status: RestartStatus::Running,
            devices: recovered_device_states(&stop_snap, &launch_snap),
        };
        orch.derive_status();
        Ok(orch)
    }
}

fn device_states(
    targets: &[Device],
    stop_record: &ExecutionRecord,
    launch_record: &ExecutionRecord,
) -> Vec<RestartDeviceState> {
    targets
        .iter()
        .map(|device| {
            let mut state = RestartDeviceState {
                device_id: device.id.clone(),
                alias: device.alias.clone(),
                force_stop: phase_status(stop_record, &device.id),
                launch: phase_status(launch_record, &device.id),
                overall: OverallStatus::Pending,
            };
            state.derive_overall();
            state
        })
        .collect()
}

fn recovered_device_states(
    stop_snap: &ExecutionSnapshot,
    launch_snap: &ExecutionSnapshot,
) -> Vec<RestartDeviceState> {
    stop_snap
        .results
        .iter()
        .map(|result| {
            let launch = launch_snap
                .results
                .iter()
                .find(|l| l.device_id == result.device_id)
                .map(|l| l.status)
                .unwrap_or(DeviceResultStatus::Pending);
            let mut state = RestartDeviceState {
                device_id: result.device_id.clone(),
                alias: result.alias.clone(),
                force_stop: result.status,
                launch,
                overall: OverallStatus::Pending,
            };
            state.derive_overall();
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
