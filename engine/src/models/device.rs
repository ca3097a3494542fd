//! Device and target models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fleet device as reported by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Registry-assigned device ID
    pub id: String,

    /// Operator-facing alias
    pub alias: String,

    /// Whether the device is currently connected
    pub online: bool,

    /// Last time the registry heard from the device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Target specification for a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Entire fleet
    All,

    /// Entire fleet, optionally restricted to online devices
    Filter { online_only: bool },

    /// Devices selected by alias; unknown aliases are dropped silently
    Aliases { aliases: Vec<String> },
}
