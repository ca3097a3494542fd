//! Application configuration options

use std::time::Duration;

use crate::config::Settings;
use crate::dispatch::dispatcher::Options as DispatchOptions;
use crate::engine::EngineOptions;
use crate::orchestrate::Options as OrchestrationOptions;
use crate::track::poller::Options as PollerOptions;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Local HTTP server configuration
    pub server: ServerOptions,

    /// Device registry collaborator
    pub registry: CollaboratorOptions,

    /// Push delivery collaborator
    pub push: CollaboratorOptions,

    /// Shell delivery collaborator
    pub shell: CollaboratorOptions,

    /// Execution store collaborator
    pub store: CollaboratorOptions,

    /// Engine assembly options
    pub engine: EngineOptions,
}

impl AppOptions {
    /// Build application options from a settings file
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            registry: CollaboratorOptions::from_settings(&settings.registry),
            push: CollaboratorOptions::from_settings(&settings.push),
            shell: CollaboratorOptions::from_settings(&settings.shell),
            store: CollaboratorOptions::from_settings(&settings.store),
            engine: EngineOptions {
                dispatch: DispatchOptions {
                    sample_aliases: settings.dispatch.sample_aliases,
                    confirm_threshold: settings.dispatch.confirm_threshold,
                    require_confirmation: settings.dispatch.require_confirmation,
                },
                poller: PollerOptions {
                    interval: Duration::from_secs(settings.poll_interval_secs),
                },
                orchestration: OrchestrationOptions {
                    poll_interval: Duration::from_secs(settings.poll_interval_secs),
                    timeout: Duration::from_secs(settings.orchestration_timeout_secs),
                },
                managed_package: settings.managed_package.clone(),
                disable_packages: settings.disable_packages.clone(),
            },
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8744,
        }
    }
}

/// Connection options for one consumed collaborator
#[derive(Debug, Clone)]
pub struct CollaboratorOptions {
    /// Base URL of the collaborator API
    pub base_url: String,

    /// Optional bearer token
    pub api_token: Option<String>,
}

impl CollaboratorOptions {
    fn from_settings(settings: &crate::config::CollaboratorSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_token: settings.api_token.clone(),
        }
    }
}
