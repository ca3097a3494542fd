//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::logs::LogLevel;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Device registry collaborator
    #[serde(default = "default_registry")]
    pub registry: CollaboratorSettings,

    /// Push delivery collaborator
    #[serde(default = "default_push")]
    pub push: CollaboratorSettings,

    /// Shell delivery collaborator
    #[serde(default = "default_shell")]
    pub shell: CollaboratorSettings,

    /// Execution store collaborator
    #[serde(default = "default_store")]
    pub store: CollaboratorSettings,

    /// Dispatch guard configuration
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Execution poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Orchestration deadline in seconds
    #[serde(default = "default_orchestration_timeout")]
    pub orchestration_timeout_secs: u64,

    /// Package managed by the reinstall orchestration
    #[serde(default = "default_managed_package")]
    pub managed_package: String,

    /// Packages covered by the disable-package-list shell preset
    #[serde(default)]
    pub disable_packages: Vec<String>,
}

fn default_poll_interval() -> u64 {
    2
}

fn default_orchestration_timeout() -> u64 {
    60
}

fn default_managed_package() -> String {
    "com.drover.kiosk".to_string()
}

fn default_registry() -> CollaboratorSettings {
    CollaboratorSettings::with_base_url("http://localhost:8100/registry/v1")
}

fn default_push() -> CollaboratorSettings {
    CollaboratorSettings::with_base_url("http://localhost:8100/push/v1")
}

fn default_shell() -> CollaboratorSettings {
    CollaboratorSettings::with_base_url("http://localhost:8100/shell/v1")
}

fn default_store() -> CollaboratorSettings {
    CollaboratorSettings::with_base_url("http://localhost:8100/store/v1")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            server: ServerSettings::default(),
            registry: default_registry(),
            push: default_push(),
            shell: default_shell(),
            store: default_store(),
            dispatch: DispatchSettings::default(),
            poll_interval_secs: default_poll_interval(),
            orchestration_timeout_secs: default_orchestration_timeout(),
            managed_package: default_managed_package(),
            disable_packages: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8744
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Connection settings for one consumed collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorSettings {
    /// Base URL of the collaborator API
    pub base_url: String,

    /// Optional bearer token
    #[serde(default)]
    pub api_token: Option<String>,
}

impl CollaboratorSettings {
    fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_token: None,
        }
    }
}

/// Dispatch guard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Blast radius above which confirmation is advised
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: usize,

    /// Whether confirmation is required at all
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Number of sample aliases included in a preview
    #[serde(default = "default_sample_aliases")]
    pub sample_aliases: usize,
}

fn default_confirm_threshold() -> usize {
    25
}

fn default_true() -> bool {
    true
}

fn default_sample_aliases() -> usize {
    5
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            confirm_threshold: default_confirm_threshold(),
            require_confirmation: true,
            sample_aliases: default_sample_aliases(),
        }
    }
}
