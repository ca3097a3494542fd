//! Collaborator interfaces
//!
//! The engine consumes four external services. Each is a trait so the core
//! can run against the HTTP implementations in `http/` or in-memory fakes in
//! tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::EngineError;
use crate::models::device::Device;
use crate::models::execution::{DeviceResult, ExecutionRecord, ExecutionSnapshot};
use crate::models::orchestration::{ReinstallLink, RestartLink};

/// Fleet membership and online status
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Fetch the current fleet snapshot
    async fn fleet(&self) -> Result<Vec<Device>, EngineError>;
}

/// Asynchronous push delivery; one JSON command per device id
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn push(&self, device_id: &str, payload: &Value) -> Result<(), EngineError>;
}

/// Restricted shell delivery; one command string per device id
///
/// The server side enforces its own allow-list.
#[async_trait]
pub trait ShellChannel: Send + Sync {
    async fn execute(&self, device_id: &str, command: &str) -> Result<(), EngineError>;
}

/// Persistent execution store, keyed by execution/restart id
///
/// Holds the authoritative state; devices acknowledge into it out-of-band.
/// Supports incremental per-device updates.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), EngineError>;

    async fn update_results(
        &self,
        exec_id: &str,
        results: &[DeviceResult],
    ) -> Result<(), EngineError>;

    async fn fetch_execution(&self, exec_id: &str) -> Result<ExecutionSnapshot, EngineError>;

    async fn create_restart(&self, link: &RestartLink) -> Result<(), EngineError>;

    async fn fetch_restart(&self, restart_id: &str) -> Result<RestartLink, EngineError>;

    async fn create_reinstall(&self, link: &ReinstallLink) -> Result<(), EngineError>;

    async fn fetch_reinstall(&self, exec_id: &str) -> Result<ReinstallLink, EngineError>;
}
