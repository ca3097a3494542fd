//! Engine tests against in-memory collaborators

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use drover::channels::{DeviceRegistry, ExecutionStore, PushChannel, ShellChannel};
use drover::command::compose::{CommandPayload, CommandSelection};
use drover::command::presets::{FcmPreset, OrchestrationKind};
use drover::dispatch::dispatcher::Options as DispatchOptions;
use drover::engine::{EngineOptions, FleetEngine, SelectionOutcome};
use drover::errors::EngineError;
use drover::models::device::{Device, TargetSpec};
use drover::models::execution::{
    DeviceResult, DeviceResultStatus, ExecutionRecord, ExecutionSnapshot, ExecutionStatus,
};
use drover::models::orchestration::{
    OverallStatus, ReinstallLink, ReinstallStatus, RestartLink, RestartStatus,
};
use drover::orchestrate::restart::{RestartRequest, RestartScope};
use drover::orchestrate::Options as OrchestrationOptions;
use drover::track::poller::Options as PollerOptions;

// =============================== FAKES ================================== //

struct MemoryRegistry {
    devices: Vec<Device>,
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn fleet(&self) -> Result<Vec<Device>, EngineError> {
        Ok(self.devices.clone())
    }
}

#[derive(Default)]
struct MemoryStore {
    executions: Mutex<HashMap<String, ExecutionSnapshot>>,
    restarts: Mutex<HashMap<String, RestartLink>>,
    reinstalls: Mutex<HashMap<String, ReinstallLink>>,
    fetches: AtomicUsize,
}

impl MemoryStore {
    /// Simulate a device acknowledging success into the store
    fn ack_ok(&self, exec_id: &str, device_id: &str) {
        self.set_status(exec_id, device_id, DeviceResultStatus::Ok, None);
    }

    /// Simulate a device reporting failure into the store
    fn ack_error(&self, exec_id: &str, device_id: &str, message: &str) {
        self.set_status(exec_id, device_id, DeviceResultStatus::Error, Some(message));
    }

    fn set_status(
        &self,
        exec_id: &str,
        device_id: &str,
        status: DeviceResultStatus,
        error: Option<&str>,
    ) {
        let mut executions = self.executions.lock().unwrap();
        let snapshot = executions.get_mut(exec_id).expect("unknown execution");
        let result = snapshot
            .results
            .iter_mut()
            .find(|r| r.device_id == device_id)
            .expect("unknown device");
        result.status = status;
        result.error = error.map(str::to_string);
        if status == DeviceResultStatus::Ok {
            result.exit_code = Some(0);
        }
        result.updated_at = Utc::now();
    }

    fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), EngineError> {
        self.executions.lock().unwrap().insert(
            record.exec_id.clone(),
            ExecutionSnapshot {
                status: ExecutionStatus::Running,
                results: record.results.clone(),
            },
        );
        Ok(())
    }

    async fn update_results(
        &self,
        exec_id: &str,
        results: &[DeviceResult],
    ) -> Result<(), EngineError> {
        let mut executions = self.executions.lock().unwrap();
        let snapshot = executions
            .get_mut(exec_id)
            .ok_or_else(|| EngineError::NotFound(exec_id.to_string()))?;
        for incoming in results {
            if let Some(result) = snapshot
                .results
                .iter_mut()
                .find(|r| r.device_id == incoming.device_id)
            {
                *result = incoming.clone();
            }
        }
        Ok(())
    }

    async fn fetch_execution(&self, exec_id: &str) -> Result<ExecutionSnapshot, EngineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.executions
            .lock()
            .unwrap()
            .get(exec_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(exec_id.to_string()))
    }

    async fn create_restart(&self, link: &RestartLink) -> Result<(), EngineError> {
        self.restarts
            .lock()
            .unwrap()
            .insert(link.restart_id.clone(), link.clone());
        Ok(())
    }

    async fn fetch_restart(&self, restart_id: &str) -> Result<RestartLink, EngineError> {
        self.restarts
            .lock()
            .unwrap()
            .get(restart_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(restart_id.to_string()))
    }

    async fn create_reinstall(&self, link: &ReinstallLink) -> Result<(), EngineError> {
        self.reinstalls
            .lock()
            .unwrap()
            .insert(link.exec_id.clone(), link.clone());
        Ok(())
    }

    async fn fetch_reinstall(&self, exec_id: &str) -> Result<ReinstallLink, EngineError> {
        self.reinstalls
            .lock()
            .unwrap()
            .get(exec_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(exec_id.to_string()))
    }
}

struct RecordingPush {
    sent: Mutex<Vec<(String, Value)>>,
    fail_for: HashSet<String>,
}

impl RecordingPush {
    fn count_command(&self, command: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, payload)| payload["command"] == command)
            .count()
    }

    fn pushed_to(&self, device_id: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|(id, _)| id == device_id)
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn push(&self, device_id: &str, payload: &Value) -> Result<(), EngineError> {
        if self.fail_for.contains(device_id) {
            return Err(EngineError::UpstreamError("push unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), payload.clone()));
        Ok(())
    }
}

struct RecordingShell {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: HashSet<String>,
}

impl RecordingShell {
    fn count_command(&self, command: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, sent)| sent == command)
            .count()
    }
}

#[async_trait]
impl ShellChannel for RecordingShell {
    async fn execute(&self, device_id: &str, command: &str) -> Result<(), EngineError> {
        if self.fail_for.contains(device_id) {
            return Err(EngineError::UpstreamError("shell unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), command.to_string()));
        Ok(())
    }
}

// ============================== HARNESS ================================= //

struct Harness {
    engine: Arc<FleetEngine>,
    store: Arc<MemoryStore>,
    push: Arc<RecordingPush>,
    shell: Arc<RecordingShell>,
}

fn device(id: &str, alias: &str, online: bool) -> Device {
    Device {
        id: id.to_string(),
        alias: alias.to_string(),
        online,
        last_seen: None,
    }
}

fn three_devices() -> Vec<Device> {
    vec![
        device("dev-1", "lobby-kiosk", true),
        device("dev-2", "warehouse-scanner", false),
        device("dev-3", "backroom-tablet", true),
    ]
}

fn harness(
    devices: Vec<Device>,
    push_fail: &[&str],
    shell_fail: &[&str],
    orch_timeout: Duration,
) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let push = Arc::new(RecordingPush {
        sent: Mutex::new(Vec::new()),
        fail_for: push_fail.iter().map(|id| id.to_string()).collect(),
    });
    let shell = Arc::new(RecordingShell {
        sent: Mutex::new(Vec::new()),
        fail_for: shell_fail.iter().map(|id| id.to_string()).collect(),
    });
    let registry = Arc::new(MemoryRegistry { devices });

    let options = EngineOptions {
        dispatch: DispatchOptions::default(),
        poller: PollerOptions {
            interval: Duration::from_millis(10),
        },
        orchestration: OrchestrationOptions {
            poll_interval: Duration::from_millis(10),
            timeout: orch_timeout,
        },
        managed_package: "com.drover.kiosk".to_string(),
        disable_packages: Vec::new(),
    };

    let engine = FleetEngine::new(registry, push.clone(), shell.clone(), store.clone(), options);
    Harness {
        engine,
        store,
        push,
        shell,
    }
}

const LONG_TIMEOUT: Duration = Duration::from_secs(10);

async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never reached: {}", what);
}

async fn wait_exec_terminal(harness: &Harness, exec_id: &str) -> ExecutionStatus {
    for _ in 0..300 {
        let view = harness.engine.execution(exec_id).await.unwrap();
        if view.status.is_terminal() {
            return view.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {} never reached a terminal status", exec_id);
}

async fn wait_restart_terminal(harness: &Harness, restart_id: &str) -> RestartStatus {
    for _ in 0..300 {
        let orch = harness.engine.restart_status(restart_id).await.unwrap();
        if orch.status.is_terminal() {
            return orch.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("restart {} never reached a terminal status", restart_id);
}

async fn wait_reinstall_terminal(harness: &Harness, exec_id: &str) -> ReinstallStatus {
    for _ in 0..300 {
        let orch = harness.engine.reinstall_status(exec_id).await.unwrap();
        if orch.status.is_terminal() {
            return orch.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("reinstall {} never reached a terminal status", exec_id);
}

fn ping() -> CommandPayload {
    CommandPayload::Fcm(FcmPreset::Ping.payload())
}

// =============================== DISPATCH =============================== //

#[tokio::test]
async fn test_online_filter_ping_scenario() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let view = harness
        .engine
        .dispatch(&TargetSpec::Filter { online_only: true }, &ping(), "tester")
        .await
        .unwrap();

    assert_eq!(view.stats.total, 2);
    assert_eq!(view.stats.sent, 2);
    assert_eq!(harness.push.count_command("ping"), 2);
    assert!(!harness.push.pushed_to("dev-2"));

    harness.store.ack_ok(&view.exec_id, "dev-1");
    harness.store.ack_ok(&view.exec_id, "dev-3");

    let status = wait_exec_terminal(&harness, &view.exec_id).await;
    assert_eq!(status, ExecutionStatus::Completed);

    let view = harness.engine.execution(&view.exec_id).await.unwrap();
    assert_eq!(view.stats.acked, 2);
    assert_eq!(view.stats.errors, 0);
}

#[tokio::test]
async fn test_send_failure_is_isolated_per_device() {
    let harness = harness(three_devices(), &["dev-1"], &[], LONG_TIMEOUT);

    let view = harness
        .engine
        .dispatch(&TargetSpec::All, &ping(), "tester")
        .await
        .unwrap();

    assert_eq!(view.stats.total, 3);
    assert_eq!(view.stats.errors, 1);
    let failed = view.results.iter().find(|r| r.device_id == "dev-1").unwrap();
    assert_eq!(failed.status, DeviceResultStatus::Error);
    assert!(failed.error.as_deref().unwrap().contains("push unavailable"));

    // Siblings are unaffected and can still complete
    harness.store.ack_ok(&view.exec_id, "dev-2");
    harness.store.ack_ok(&view.exec_id, "dev-3");
    let status = wait_exec_terminal(&harness, &view.exec_id).await;
    assert_eq!(status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_dispatch_with_no_matching_targets_is_rejected() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let spec = TargetSpec::Aliases {
        aliases: vec!["ghost".to_string()],
    };
    let err = harness
        .engine
        .dispatch(&spec, &ping(), "tester")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ValidationError(_)));
    // Rejected before any dispatch, never partially applied
    assert_eq!(harness.store.execution_count(), 0);
    assert_eq!(harness.push.sent.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_preview_has_no_side_effects() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let preview = harness
        .engine
        .preview(&TargetSpec::Filter { online_only: true })
        .await
        .unwrap();

    assert_eq!(preview.estimated_count, 2);
    assert_eq!(preview.sample_aliases, vec!["lobby-kiosk", "backroom-tablet"]);
    assert!(!preview.requires_confirmation);
    assert_eq!(harness.store.execution_count(), 0);
    assert_eq!(harness.push.sent.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_stop_watch_cancels_the_local_poll_only() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let view = harness
        .engine
        .dispatch(&TargetSpec::All, &ping(), "tester")
        .await
        .unwrap();

    assert!(harness.engine.watching().await.contains(&view.exec_id));
    assert!(harness.engine.stop_watch(&view.exec_id).await);
    assert!(!harness.engine.stop_watch(&view.exec_id).await);

    // The dispatched command is not recalled
    assert_eq!(harness.push.count_command("ping"), 3);
}

// =============================== RESTART ================================ //

fn restart_all(package: &str) -> RestartRequest {
    RestartRequest {
        package_name: package.to_string(),
        online_only: false,
        scope: RestartScope::All,
        aliases: Vec::new(),
    }
}

#[tokio::test]
async fn test_restart_all_ok_completes() {
    let devices = vec![device("dev-1", "a", true), device("dev-2", "b", true)];
    let harness = harness(devices, &[], &[], LONG_TIMEOUT);

    let orch = harness
        .engine
        .restart_app(restart_all("com.example.app"), "tester")
        .await
        .unwrap();

    assert_eq!(orch.status, RestartStatus::Running);
    assert_eq!(harness.shell.count_command("am force-stop com.example.app"), 2);
    assert_eq!(harness.push.count_command("launch_app"), 0);

    harness.store.ack_ok(&orch.stop_exec_id, "dev-1");
    harness.store.ack_ok(&orch.stop_exec_id, "dev-2");

    // Phase 2 goes out only after phase 1 acknowledges
    wait_until("both launches dispatched", || {
        harness.push.count_command("launch_app") == 2
    })
    .await;

    harness.store.ack_ok(&orch.launch_exec_id, "dev-1");
    harness.store.ack_ok(&orch.launch_exec_id, "dev-2");

    let status = wait_restart_terminal(&harness, &orch.restart_id).await;
    assert_eq!(status, RestartStatus::Completed);

    let orch = harness.engine.restart_status(&orch.restart_id).await.unwrap();
    let stats = orch.stats();
    assert_eq!(stats.ok, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_restart_mixed_outcome_is_partial() {
    let devices = vec![device("dev-1", "a", true), device("dev-2", "b", true)];
    let harness = harness(devices, &["dev-2"], &[], LONG_TIMEOUT);

    let orch = harness
        .engine
        .restart_app(restart_all("com.example.app"), "tester")
        .await
        .unwrap();

    harness.store.ack_ok(&orch.stop_exec_id, "dev-1");
    harness.store.ack_ok(&orch.stop_exec_id, "dev-2");

    // dev-1 launches and acknowledges; dev-2's launch submission fails
    wait_until("dev-1 launch dispatched", || {
        harness.push.count_command("launch_app") == 1
    })
    .await;
    harness.store.ack_ok(&orch.launch_exec_id, "dev-1");

    let status = wait_restart_terminal(&harness, &orch.restart_id).await;
    assert_eq!(status, RestartStatus::Partial);

    let orch = harness.engine.restart_status(&orch.restart_id).await.unwrap();
    let stats = orch.stats();
    assert_eq!(stats.ok, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_restart_all_errors_is_failed() {
    let devices = vec![device("dev-1", "a", true), device("dev-2", "b", true)];
    let harness = harness(devices, &[], &["dev-1", "dev-2"], LONG_TIMEOUT);

    let orch = harness
        .engine
        .restart_app(restart_all("com.example.app"), "tester")
        .await
        .unwrap();

    let status = wait_restart_terminal(&harness, &orch.restart_id).await;
    assert_eq!(status, RestartStatus::Failed);

    let orch = harness.engine.restart_status(&orch.restart_id).await.unwrap();
    assert!(orch
        .devices
        .iter()
        .all(|d| d.overall == OverallStatus::Error));
}

#[tokio::test]
async fn test_restart_deadline_times_out_and_stops_polling() {
    let devices = vec![device("dev-1", "a", true)];
    let harness = harness(devices, &[], &[], Duration::from_millis(200));

    let orch = harness
        .engine
        .restart_app(restart_all("com.example.app"), "tester")
        .await
        .unwrap();

    // The force-stop is never acknowledged
    let status = wait_restart_terminal(&harness, &orch.restart_id).await;
    assert_eq!(status, RestartStatus::TimedOut);

    let orch = harness.engine.restart_status(&orch.restart_id).await.unwrap();
    assert_eq!(orch.devices[0].overall, OverallStatus::Error);

    // No further poll requests after the deadline
    let fetches = harness.store.fetch_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.store.fetch_count(), fetches);
}

#[tokio::test]
async fn test_restart_status_for_unknown_id_is_not_found() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);
    let err = harness.engine.restart_status("missing").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// ============================== REINSTALL =============================== //

#[tokio::test]
async fn test_reinstall_all_ok() {
    let devices = vec![device("dev-1", "a", true)];
    let harness = harness(devices, &[], &[], LONG_TIMEOUT);

    let orch = harness
        .engine
        .reinstall_dispatch(&["dev-1".to_string()], "tester")
        .await
        .unwrap();

    assert_eq!(orch.status, ReinstallStatus::Pending);
    assert_eq!(harness.push.count_command("reinstall_app"), 1);

    harness.store.ack_ok(&orch.reinstall_exec_id, "dev-1");
    wait_until("launch dispatched", || {
        harness.push.count_command("launch_app") == 1
    })
    .await;
    harness.store.ack_ok(&orch.launch_exec_id, "dev-1");

    let status = wait_reinstall_terminal(&harness, &orch.exec_id).await;
    assert_eq!(status, ReinstallStatus::Ok);

    let orch = harness.engine.reinstall_status(&orch.exec_id).await.unwrap();
    assert_eq!(orch.stats().ok, 1);
}

#[tokio::test]
async fn test_reinstall_requires_every_device_to_succeed() {
    let devices = vec![device("dev-1", "a", true), device("dev-2", "b", true)];
    let harness = harness(devices, &[], &[], LONG_TIMEOUT);

    let orch = harness
        .engine
        .reinstall_dispatch(&["dev-1".to_string(), "dev-2".to_string()], "tester")
        .await
        .unwrap();

    harness.store.ack_ok(&orch.reinstall_exec_id, "dev-1");
    harness.store.ack_ok(&orch.reinstall_exec_id, "dev-2");
    wait_until("both launches dispatched", || {
        harness.push.count_command("launch_app") == 2
    })
    .await;
    harness.store.ack_ok(&orch.launch_exec_id, "dev-1");
    harness
        .store
        .ack_error(&orch.launch_exec_id, "dev-2", "install verification failed");

    // No partial outcome exists for reinstall
    let status = wait_reinstall_terminal(&harness, &orch.exec_id).await;
    assert_eq!(status, ReinstallStatus::Failed);

    let orch = harness.engine.reinstall_status(&orch.exec_id).await.unwrap();
    let stats = orch.stats();
    assert_eq!(stats.ok, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_reinstall_deadline_fails_the_job() {
    let devices = vec![device("dev-1", "a", true)];
    let harness = harness(devices, &[], &[], Duration::from_millis(200));

    let orch = harness
        .engine
        .reinstall_dispatch(&["dev-1".to_string()], "tester")
        .await
        .unwrap();

    let status = wait_reinstall_terminal(&harness, &orch.exec_id).await;
    assert_eq!(status, ReinstallStatus::Failed);
}

#[tokio::test]
async fn test_reinstall_drops_unknown_device_ids() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let count = harness
        .engine
        .reinstall_preview(&["dev-1".to_string(), "ghost".to_string()])
        .await
        .unwrap();
    assert_eq!(count, 1);

    let err = harness
        .engine
        .reinstall_dispatch(&["ghost".to_string()], "tester")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationError(_)));
}

// =============================== SENTINEL =============================== //

#[tokio::test]
async fn test_sentinel_selection_routes_to_reinstall() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let selection = CommandSelection::Orchestration(OrchestrationKind::ReinstallAndLaunch);
    let outcome = harness
        .engine
        .dispatch_selection(&selection, &TargetSpec::All, "tester")
        .await
        .unwrap();

    match outcome {
        SelectionOutcome::Reinstall(orch) => {
            assert_eq!(orch.devices.len(), 3);
        }
        SelectionOutcome::Execution(_) => panic!("sentinel must route to the reinstall controller"),
    }

    // The sentinel never becomes a raw payload
    assert_eq!(harness.push.count_command("soft_update_refresh"), 0);
    assert_eq!(harness.push.count_command("reinstall_app"), 3);
}

#[tokio::test]
async fn test_preset_selection_dispatches_an_execution() {
    let harness = harness(three_devices(), &[], &[], LONG_TIMEOUT);

    let selection = CommandSelection::Fcm(FcmPreset::Ping);
    let outcome = harness
        .engine
        .dispatch_selection(&selection, &TargetSpec::All, "tester")
        .await
        .unwrap();

    match outcome {
        SelectionOutcome::Execution(view) => {
            assert_eq!(view.stats.total, 3);
        }
        SelectionOutcome::Reinstall(_) => panic!("preset selection must dispatch an execution"),
    }
}
