//! Fleet engine assembly

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::channels::{DeviceRegistry, ExecutionStore, PushChannel, ShellChannel};
use crate::command::compose::{CommandPayload, CommandSelection, Composer};
use crate::command::presets::{self, OrchestrationKind, PresetInfo};
use crate::dispatch::dispatcher::{Dispatcher, Options as DispatchOptions, Preview};
use crate::errors::EngineError;
use crate::models::device::{Device, TargetSpec};
use crate::models::execution::{DeviceResult, ExecStats, ExecutionStatus};
use crate::models::orchestration::{ReinstallOrchestration, RestartOrchestration};
use crate::orchestrate::reinstall::ReinstallController;
use crate::orchestrate::restart::{RestartController, RestartRequest};
use crate::orchestrate::Options as OrchestrationOptions;
use crate::track::poller::{self, Options as PollerOptions};
use crate::track::tracker::ExecutionTracker;
use crate::track::watch::PollRegistry;

/// Engine assembly options
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub dispatch: DispatchOptions,
    pub poller: PollerOptions,
    pub orchestration: OrchestrationOptions,
    pub managed_package: String,
    pub disable_packages: Vec<String>,
}

/// Point-in-time view of an execution's progress
#[derive(Debug, Clone)]
pub struct ExecutionView {
    pub exec_id: String,
    pub status: ExecutionStatus,
    pub stats: ExecStats,
    pub results: Vec<DeviceResult>,
}

/// Outcome of dispatching a composed selection
///
/// The orchestration sentinel routes to the reinstall controller instead of
/// producing an execution record.
pub enum SelectionOutcome {
    Execution(ExecutionView),
    Reinstall(ReinstallOrchestration),
}

/// The fleet command dispatch and execution-tracking engine
pub struct FleetEngine {
    registry: Arc<dyn DeviceRegistry>,
    store: Arc<dyn ExecutionStore>,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<ExecutionTracker>,
    polls: Arc<PollRegistry>,
    restart: Arc<RestartController>,
    reinstall: Arc<ReinstallController>,
    composer: Composer,
    poller_options: PollerOptions,
    orchestration_options: OrchestrationOptions,
}

impl FleetEngine {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        push: Arc<dyn PushChannel>,
        shell: Arc<dyn ShellChannel>,
        store: Arc<dyn ExecutionStore>,
        options: EngineOptions,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            push,
            shell,
            store.clone(),
            options.dispatch,
        ));
        let restart = Arc::new(RestartController::new(
            dispatcher.clone(),
            store.clone(),
            options.orchestration.clone(),
        ));
        let reinstall = Arc::new(ReinstallController::new(
            dispatcher.clone(),
            store.clone(),
            options.orchestration.clone(),
            options.managed_package,
        ));

        Arc::new(Self {
            registry,
            store,
            dispatcher,
            tracker: Arc::new(ExecutionTracker::new()),
            polls: Arc::new(PollRegistry::new()),
            restart,
            reinstall,
            composer: Composer::new(options.disable_packages),
            poller_options: options.poller,
            orchestration_options: options.orchestration,
        })
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Current fleet snapshot from the registry
    pub async fn fleet(&self) -> Result<Vec<Device>, EngineError> {
        self.registry.fleet().await
    }

    /// The operator-facing preset catalog
    pub fn catalog(&self) -> Vec<PresetInfo> {
        presets::catalog()
    }

    /// Preview a dispatch without side effects
    pub async fn preview(&self, spec: &TargetSpec) -> Result<Preview, EngineError> {
        self.dispatcher.preview(spec).await
    }

    /// Dispatch a payload and start watching the new execution
    pub async fn dispatch(
        &self,
        spec: &TargetSpec,
        payload: &CommandPayload,
        created_by: &str,
    ) -> Result<ExecutionView, EngineError> {
        let record = self.dispatcher.dispatch(spec, payload, created_by).await?;
        let view = ExecutionView {
            exec_id: record.exec_id.clone(),
            status: record.status,
            stats: record.stats,
            results: record.results.clone(),
        };
        self.tracker.insert(record).await;
        self.watch_execution(&view.exec_id).await;
        Ok(view)
    }

    /// Dispatch a composed selection
    ///
    /// The orchestration sentinel never reaches payload building; it resolves
    /// the spec to device ids and hands off to the reinstall controller.
    pub async fn dispatch_selection(
        &self,
        selection: &CommandSelection,
        spec: &TargetSpec,
        created_by: &str,
    ) -> Result<SelectionOutcome, EngineError> {
        match self.composer.payload_for(selection)? {
            Some(payload) => {
                let view = self.dispatch(spec, &payload, created_by).await?;
                Ok(SelectionOutcome::Execution(view))
            }
            None => {
                let CommandSelection::Orchestration(OrchestrationKind::ReinstallAndLaunch) =
                    selection
                else {
                    return Err(EngineError::Internal(
                        "selection produced no payload".to_string(),
                    ));
                };
                let targets = self.dispatcher.resolve_targets(spec).await?;
                let device_ids: Vec<String> = targets.into_iter().map(|d| d.id).collect();
                let orch = self.reinstall_dispatch(&device_ids, created_by).await?;
                Ok(SelectionOutcome::Reinstall(orch))
            }
        }
    }

    /// Current view of an execution
    ///
    /// Prefers the locally tracked record; falls back to the store snapshot
    /// for executions observed elsewhere.
    pub async fn execution(&self, exec_id: &str) -> Result<ExecutionView, EngineError> {
        if let Some(record) = self.tracker.get(exec_id).await {
            return Ok(ExecutionView {
                exec_id: record.exec_id.clone(),
                status: record.status,
                stats: record.stats,
                results: record.results,
            });
        }

        let snapshot = self.store.fetch_execution(exec_id).await?;
        let stats = ExecStats::from_results(&snapshot.results);
        Ok(ExecutionView {
            exec_id: exec_id.to_string(),
            status: snapshot.status,
            stats,
            results: snapshot.results,
        })
    }

    /// Export an execution's results as delimited text
    pub async fn export(&self, exec_id: &str) -> Result<String, EngineError> {
        let view = self.execution(exec_id).await?;
        crate::export::csv::export_results(&view.results)
    }

    /// Stop watching an id; the dispatched command itself cannot be recalled
    pub async fn stop_watch(&self, id: &str) -> bool {
        self.polls.stop(id).await
    }

    /// Ids currently being watched
    pub async fn watching(&self) -> Vec<String> {
        self.polls.active().await
    }

    /// Dispatch a restart-app orchestration and start its bounded poll
    pub async fn restart_app(
        &self,
        request: RestartRequest,
        created_by: &str,
    ) -> Result<RestartOrchestration, EngineError> {
        let orch = self.restart.dispatch(request, created_by).await?;
        self.watch_restart(&orch.restart_id).await;
        Ok(orch)
    }

    /// Current restart orchestration view
    pub async fn restart_status(
        &self,
        restart_id: &str,
    ) -> Result<RestartOrchestration, EngineError> {
        self.restart.status(restart_id).await
    }

    /// Count the devices a reinstall request would reach
    pub async fn reinstall_preview(&self, device_ids: &[String]) -> Result<usize, EngineError> {
        Ok(self.reinstall.resolve(device_ids).await?.len())
    }

    /// Dispatch a reinstall-and-launch orchestration and start its bounded poll
    pub async fn reinstall_dispatch(
        &self,
        device_ids: &[String],
        created_by: &str,
    ) -> Result<ReinstallOrchestration, EngineError> {
        let orch = self.reinstall.dispatch(device_ids, created_by).await?;
        self.watch_reinstall(&orch.exec_id).await;
        Ok(orch)
    }

    /// Current reinstall orchestration view
    pub async fn reinstall_status(
        &self,
        exec_id: &str,
    ) -> Result<ReinstallOrchestration, EngineError> {
        self.reinstall.status(exec_id).await
    }

    /// Stop all polling tasks
    pub async fn shutdown(&self) {
        self.polls.stop_all().await;
    }

    async fn watch_execution(&self, exec_id: &str) {
        if self.polls.contains(exec_id).await {
            return;
        }
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let options = self.poller_options.clone();
        let store = self.store.clone();
        let tracker = self.tracker.clone();
        let id = exec_id.to_string();
        let handle = tokio::spawn(async move {
            poller::run(
                &options,
                &id,
                store,
                tracker,
                tokio::time::sleep,
                Box::pin(async move {
                    let _ = cancel_rx.recv().await;
                }),
            )
            .await;
        });
        self.polls.register(exec_id, cancel_tx, handle).await;
    }

    async fn watch_restart(&self, restart_id: &str) {
        if self.polls.contains(restart_id).await {
            return;
        }
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let controller = self.restart.clone();
        let id = restart_id.to_string();
        let handle = tokio::spawn(async move {
            controller
                .run_poll(
                    id,
                    tokio::time::sleep,
                    Box::pin(async move {
                        let _ = cancel_rx.recv().await;
                    }),
                )
                .await;
        });
        self.polls.register(restart_id, cancel_tx, handle).await;
    }

    async fn watch_reinstall(&self, exec_id: &str) {
        if self.polls.contains(exec_id).await {
            return;
        }
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let controller = self.reinstall.clone();
        let id = exec_id.to_string();
        let handle = tokio::spawn(async move {
            controller
                .run_poll(
                    id,
                    tokio::time::sleep,
                    Box::pin(async move {
                        let _ = cancel_rx.recv().await;
                    }),
                )
                .await;
        });
        self.polls.register(exec_id, cancel_tx, handle).await;
    }

    /// Poll/deadline discipline used by the orchestration controllers
    pub fn orchestration_options(&self) -> &OrchestrationOptions {
        &self.orchestration_options
    }
}
