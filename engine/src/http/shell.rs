//! Shell delivery API client

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::channels::ShellChannel;
use crate::errors::EngineError;
use crate::http::client::HttpClient;

/// Shell submission request
#[derive(Debug, Clone, Serialize)]
pub struct ShellRequest<'a> {
    pub command: &'a str,
}

impl HttpClient {
    /// Submit one command string for execution on a device
    ///
    /// The server enforces its allow-list and may reject the command.
    pub async fn execute_shell(&self, device_id: &str, command: &str) -> Result<(), EngineError> {
        let path = format!("/shell/{}", device_id);
        let _: Value = self.post(&path, &ShellRequest { command }).await?;
        Ok(())
    }
}

/// Shell collaborator backed by its HTTP API
pub struct HttpShellChannel {
    client: Arc<HttpClient>,
}

impl HttpShellChannel {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ShellChannel for HttpShellChannel {
    async fn execute(&self, device_id: &str, command: &str) -> Result<(), EngineError> {
        self.client.execute_shell(device_id, command).await
    }
}
