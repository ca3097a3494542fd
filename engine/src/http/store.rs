//! Execution store API client

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::channels::ExecutionStore;
use crate::errors::EngineError;
use crate::http::client::HttpClient;
use crate::models::execution::{DeviceResult, ExecutionRecord, ExecutionSnapshot};
use crate::models::orchestration::{ReinstallLink, RestartLink};

/// Incremental per-device update request
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResultsRequest<'a> {
    pub results: &'a [DeviceResult],
}

impl HttpClient {
    pub async fn create_execution_record(
        &self,
        record: &ExecutionRecord,
    ) -> Result<(), EngineError> {
        let _: Value = self.post("/executions", record).await?;
        Ok(())
    }

    pub async fn update_execution_results(
        &self,
        exec_id: &str,
        results: &[DeviceResult],
    ) -> Result<(), EngineError> {
        let path = format!("/executions/{}/results", exec_id);
        let _: Value = self.patch(&path, &UpdateResultsRequest { results }).await?;
        Ok(())
    }

    pub async fn fetch_execution_snapshot(
        &self,
        exec_id: &str,
    ) -> Result<ExecutionSnapshot, EngineError> {
        let path = format!("/executions/{}", exec_id);
        self.get(&path).await
    }

    pub async fn create_restart_link(&self, link: &RestartLink) -> Result<(), EngineError> {
        let _: Value = self.post("/restarts", link).await?;
        Ok(())
    }

    pub async fn fetch_restart_link(&self, restart_id: &str) -> Result<RestartLink, EngineError> {
        let path = format!("/restarts/{}", restart_id);
        self.get(&path).await
    }

    pub async fn create_reinstall_link(&self, link: &ReinstallLink) -> Result<(), EngineError> {
        let _: Value = self.post("/reinstalls", link).await?;
        Ok(())
    }

    pub async fn fetch_reinstall_link(&self, exec_id: &str) -> Result<ReinstallLink, EngineError> {
        let path = format!("/reinstalls/{}", exec_id);
        self.get(&path).await
    }
}

/// Store collaborator backed by its HTTP API
pub struct HttpExecutionStore {
    client: Arc<HttpClient>,
}

impl HttpExecutionStore {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionStore for HttpExecutionStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), EngineError> {
        self.client.create_execution_record(record).await
    }

    async fn update_results(
        &self,
        exec_id: &str,
        results: &[DeviceResult],
    ) -> Result<(), EngineError> {
        self.client.update_execution_results(exec_id, results).await
    }

    async fn fetch_execution(&self, exec_id: &str) -> Result<ExecutionSnapshot, EngineError> {
        self.client.fetch_execution_snapshot(exec_id).await
    }

    async fn create_restart(&self, link: &RestartLink) -> Result<(), EngineError> {
        self.client.create_restart_link(link).await
    }

    async fn fetch_restart(&self, restart_id: &str) -> Result<RestartLink, EngineError> {
        self.client.fetch_restart_link(restart_id).await
    }

    async fn create_reinstall(&self, link: &ReinstallLink) -> Result<(), EngineError> {
        self.client.create_reinstall_link(link).await
    }

    async fn fetch_reinstall(&self, exec_id: &str) -> Result<ReinstallLink, EngineError> {
        self.client.fetch_reinstall_link(exec_id).await
    }
}
