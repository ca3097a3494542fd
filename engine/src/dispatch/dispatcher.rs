//! Command dispatch against a resolved target set

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::channels::{DeviceRegistry, ExecutionStore, PushChannel, ShellChannel};
use crate::command::compose::CommandPayload;
use crate::dispatch::confirm;
use crate::errors::EngineError;
use crate::models::device::{Device, TargetSpec};
use crate::models::execution::{DispatchMode, ExecutionRecord};
use crate::targets;

/// Dispatcher options
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of sample aliases included in a preview
    pub sample_aliases: usize,

    /// Blast radius above which confirmation is advised
    pub confirm_threshold: usize,

    /// Whether confirmation is required at all
    pub require_confirmation: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sample_aliases: 5,
            confirm_threshold: 25,
            require_confirmation: true,
        }
    }
}

/// Read-only dispatch preview
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub estimated_count: usize,
    pub sample_aliases: Vec<String>,

    /// Advisory confirmation gate verdict
    pub requires_confirmation: bool,
}

/// Submits commands to resolved target sets
pub struct Dispatcher {
    registry: Arc<dyn DeviceRegistry>,
    push: Arc<dyn PushChannel>,
    shell: Arc<dyn ShellChannel>,
    store: Arc<dyn ExecutionStore>,
    options: Options,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        push: Arc<dyn PushChannel>,
        shell: Arc<dyn ShellChannel>,
        store: Arc<dyn ExecutionStore>,
        options: Options,
    ) -> Self {
        Self {
            registry,
            push,
            shell,
            store,
            options,
        }
    }

    /// Resolve a target spec against the live fleet
    pub async fn resolve_targets(&self, spec: &TargetSpec) -> Result<Vec<Device>, EngineError> {
        let fleet = self.registry.fleet().await?;
        Ok(targets::resolve(spec, &fleet))
    }

    /// Preview a dispatch without side effects
    pub async fn preview(&self, spec: &TargetSpec) -> Result<Preview, EngineError> {
        let targets = self.resolve_targets(spec).await?;
        let sample_aliases = targets
            .iter()
            .take(self.options.sample_aliases)
            .map(|d| d.alias.clone())
            .collect();

        Ok(Preview {
            estimated_count: targets.len(),
            sample_aliases,
            requires_confirmation: confirm::should_block(
                targets.len(),
                self.options.confirm_threshold,
                self.options.require_confirmation,
            ),
        })
    }

    /// Dispatch a payload to every device matched by the spec
    pub async fn dispatch(
        &self,
        spec: &TargetSpec,
        payload: &CommandPayload,
        created_by: &str,
    ) -> Result<ExecutionRecord, EngineError> {
        let targets = self.resolve_targets(spec).await?;
        self.dispatch_to(targets, payload, created_by).await
    }

    /// Dispatch a payload to an already-resolved target set
    ///
    /// Creates the execution record first, then submits per device. A send
    /// failure marks only that device's result; siblings are unaffected.
    pub async fn dispatch_to(
        &self,
        targets: Vec<Device>,
        payload: &CommandPayload,
        created_by: &str,
    ) -> Result<ExecutionRecord, EngineError> {
        if targets.is_empty() {
            return Err(EngineError::ValidationError(
                "no devices match the target spec".to_string(),
            ));
        }

        let mut record = ExecutionRecord::new(payload.mode(), targets, created_by);
        self.store.create_execution(&record).await.map_err(|e| {
            EngineError::DispatchError(format!("failed to create execution record: {}", e))
        })?;

        info!(
            "Dispatching {:?} command {} to {} devices",
            record.mode,
            record.exec_id,
            record.results.len()
        );

        for result in record.results.iter_mut() {
            let sent = match payload {
                CommandPayload::Fcm(value) => self.push.push(&result.device_id, value).await,
                CommandPayload::Shell(command) => {
                    self.shell.execute(&result.device_id, command).await
                }
            };
            match sent {
                Ok(()) => result.mark_sent(),
                Err(e) => {
                    warn!("Send to device {} failed: {}", result.device_id, e);
                    result.mark_error(e.to_string());
                }
            }
        }
        record.refresh_stats();

        // Sends already happened; a failed store update must not lose them
        if let Err(e) = self
            .store
            .update_results(&record.exec_id, &record.results)
            .await
        {
            warn!(
                "Failed to persist send results for {}: {}",
                record.exec_id, e
            );
        }

        Ok(record)
    }

    /// Create a record for a deferred phase without submitting anything
    ///
    /// Used by orchestration controllers whose second phase is gated on the
    /// first; every result starts pending.
    pub async fn register(
        &self,
        mode: DispatchMode,
        targets: Vec<Device>,
        created_by: &str,
    ) -> Result<ExecutionRecord, EngineError> {
        if targets.is_empty() {
            return Err(EngineError::ValidationError(
                "no devices match the target spec".to_string(),
            ));
        }

        let record = ExecutionRecord::new(mode, targets, created_by);
        self.store.create_execution(&record).await.map_err(|e| {
            EngineError::DispatchError(format!("failed to create execution record: {}", e))
        })?;
        Ok(record)
    }

    /// Submit a payload to a single device of an existing record
    pub async fn send_one(
        &self,
        record: &mut ExecutionRecord,
        device_id: &str,
        payload: &CommandPayload,
    ) {
        let Some(result) = record.result_mut(device_id) else {
            return;
        };

        let sent = match payload {
            CommandPayload::Fcm(value) => self.push.push(device_id, value).await,
            CommandPayload::Shell(command) => self.shell.execute(device_id, command).await,
        };
        match sent {
            Ok(()) => result.mark_sent(),
            Err(e) => {
                warn!("Send to device {} failed: {}", device_id, e);
                result.mark_error(e.to_string());
            }
        }

        let updated = vec![result.clone()];
        record.refresh_stats();
        if let Err(e) = self.store.update_results(&record.exec_id, &updated).await {
            warn!(
                "Failed to persist send result for {}: {}",
                record.exec_id, e
            );
        }
    }
}
