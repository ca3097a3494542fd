//! Push delivery API client

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::channels::PushChannel;
use crate::errors::EngineError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Submit one JSON command for asynchronous delivery to a device
    pub async fn push_command(&self, device_id: &str, payload: &Value) -> Result<(), EngineError> {
        let path = format!("/push/{}", device_id);
        let _: Value = self.post(&path, payload).await?;
        Ok(())
    }
}

/// Push collaborator backed by its HTTP API
pub struct HttpPushChannel {
    client: Arc<HttpClient>,
}

impl HttpPushChannel {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn push(&self, device_id: &str, payload: &Value) -> Result<(), EngineError> {
        self.client.push_command(device_id, payload).await
    }
}
