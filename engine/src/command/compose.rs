//! Command payload composition and validation

use serde_json::Value;

use crate::command::presets::{FcmPreset, OrchestrationKind, ShellPreset};
use crate::errors::EngineError;
use crate::models::execution::DispatchMode;

/// A validated command payload, immutable once composed
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    Fcm(Value),
    Shell(String),
}

impl CommandPayload {
    pub fn mode(&self) -> DispatchMode {
        match self {
            CommandPayload::Fcm(_) => DispatchMode::Fcm,
            CommandPayload::Shell(_) => DispatchMode::Shell,
        }
    }
}

/// Operator selection at the composition layer
///
/// The orchestration variant is a sentinel: it carries no payload and must be
/// routed to its controller, never through payload-building code.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSelection {
    Fcm(FcmPreset),
    Shell(ShellPreset),
    Orchestration(OrchestrationKind),
}

/// Builds validated command payloads
#[derive(Debug, Clone)]
pub struct Composer {
    disable_packages: Vec<String>,
}

impl Composer {
    pub fn new(disable_packages: Vec<String>) -> Self {
        Self { disable_packages }
    }

    /// Build the payload for a selection
    ///
    /// Returns `Ok(None)` for the orchestration sentinel, which has no
    /// payload by construction. A shell preset that renders empty (an
    /// unconfigured package list) is rejected like any empty shell command.
    pub fn payload_for(
        &self,
        selection: &CommandSelection,
    ) -> Result<Option<CommandPayload>, EngineError> {
        match selection {
            CommandSelection::Fcm(preset) => Ok(Some(CommandPayload::Fcm(preset.payload()))),
            CommandSelection::Shell(preset) => {
                Self::compose_shell(&preset.command(&self.disable_packages)).map(Some)
            }
            CommandSelection::Orchestration(_) => Ok(None),
        }
    }

    /// Validate a raw push payload
    ///
    /// The payload must parse as a JSON object. An empty payload is only valid
    /// for the orchestration sentinel, which never reaches this path.
    pub fn compose_fcm(raw: &str) -> Result<CommandPayload, EngineError> {
        if raw.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "push payload must not be empty".to_string(),
            ));
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EngineError::ValidationError(format!("invalid push payload: {}", e)))?;
        Self::validate_fcm(value)
    }

    /// Validate an already-parsed push payload
    pub fn validate_fcm(value: Value) -> Result<CommandPayload, EngineError> {
        if !value.is_object() {
            return Err(EngineError::ValidationError(
                "push payload must be a JSON object".to_string(),
            ));
        }
        Ok(CommandPayload::Fcm(value))
    }

    /// Validate a raw shell command
    ///
    /// An empty command is rejected locally; the shell channel's server
    /// enforces the allow-list and may reject further.
    pub fn compose_shell(command: &str) -> Result<CommandPayload, EngineError> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return Err(EngineError::ValidationError(
                "shell command must not be empty".to_string(),
            ));
        }
        Ok(CommandPayload::Shell(trimmed.to_string()))
    }
}
