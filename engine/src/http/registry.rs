//! Device registry API client

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::channels::DeviceRegistry;
use crate::errors::EngineError;
use crate::http::client::HttpClient;
use crate::models::device::Device;

/// Fleet listing response
#[derive(Debug, Clone, Deserialize)]
pub struct FleetResponse {
    pub devices: Vec<Device>,
}

impl HttpClient {
    /// Fetch fleet membership and online status
    pub async fn fetch_fleet(&self) -> Result<Vec<Device>, EngineError> {
        let response: FleetResponse = self.get("/devices").await?;
        Ok(response.devices)
    }
}

/// Registry collaborator backed by its HTTP API
pub struct HttpDeviceRegistry {
    client: Arc<HttpClient>,
}

impl HttpDeviceRegistry {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn fleet(&self) -> Result<Vec<Device>, EngineError> {
        self.client.fetch_fleet().await
    }
}
