//! HTTP client implementation

use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::EngineError;

/// HTTP client for one collaborator service
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, EngineError> {
        Url::parse(base_url)
            .map_err(|e| EngineError::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let request = self.with_auth(self.client.get(&url));
        let response = request.send().await?;

        self.parse_response(path, response).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let request = self.with_auth(self.client.post(&url)).json(body);
        let response = request.send().await?;

        self.parse_response(path, response).await
    }

    /// Make a PATCH request
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PATCH {}", url);

        let request = self.with_auth(self.client.patch(&url)).json(body);
        let response = request.send().await?;

        self.parse_response(path, response).await
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("HTTP request failed: {} - {}", status, body);
            return Err(EngineError::UpstreamError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }
}
