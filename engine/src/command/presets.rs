//! Built-in command presets

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Fixed JSON command templates for the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum FcmPreset {
    Ping,
    Ring { duration_secs: u32 },
    Reboot { reason: String },
    LaunchApp { package: String },
    ForceStopApp { package: String },
    ClearAppData { package: String },
    SetDnd { enable: bool },
    ExemptUnityApp,
    EnableStayAwake,
}

impl FcmPreset {
    pub fn id(&self) -> &'static str {
        match self {
            FcmPreset::Ping => "ping",
            FcmPreset::Ring { .. } => "ring",
            FcmPreset::Reboot { .. } => "reboot",
            FcmPreset::LaunchApp { .. } => "launch_app",
            FcmPreset::ForceStopApp { .. } => "force_stop_app",
            FcmPreset::ClearAppData { .. } => "clear_app_data",
            FcmPreset::SetDnd { .. } => "set_dnd",
            FcmPreset::ExemptUnityApp => "exempt_unity_app",
            FcmPreset::EnableStayAwake => "enable_stay_awake",
        }
    }

    /// Build the push payload for this preset
    pub fn payload(&self) -> Value {
        match self {
            FcmPreset::Ping => json!({ "command": "ping" }),
            FcmPreset::Ring { duration_secs } => json!({
                "command": "ring",
                "duration": duration_secs,
            }),
            FcmPreset::Reboot { reason } => json!({
                "command": "reboot",
                "reason": reason,
            }),
            FcmPreset::LaunchApp { package } => json!({
                "command": "launch_app",
                "package": package,
            }),
            FcmPreset::ForceStopApp { package } => json!({
                "command": "force_stop_app",
                "package": package,
            }),
            FcmPreset::ClearAppData { package } => json!({
                "command": "clear_app_data",
                "package": package,
            }),
            FcmPreset::SetDnd { enable } => json!({
                "command": "set_dnd",
                "enable": enable,
            }),
            FcmPreset::ExemptUnityApp => json!({ "command": "exempt_unity_app" }),
            FcmPreset::EnableStayAwake => json!({ "command": "enable_stay_awake" }),
        }
    }
}

/// Allow-listed shell command presets
///
/// Every preset maps to a fixed command string; `DisablePackages` is templated
/// from the configured package list, never from operator text. The shell
/// channel's server enforces its own allow-list on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellPreset {
    Reboot,
    Uptime,
    DisablePackages,
}

impl ShellPreset {
    pub fn id(&self) -> &'static str {
        match self {
            ShellPreset::Reboot => "reboot_shell",
            ShellPreset::Uptime => "uptime",
            ShellPreset::DisablePackages => "disable_package_list",
        }
    }

    /// Render the command string; `disable_packages` comes from settings
    pub fn command(&self, disable_packages: &[String]) -> String {
        match self {
            ShellPreset::Reboot => "reboot".to_string(),
            ShellPreset::Uptime => "uptime".to_string(),
            ShellPreset::DisablePackages => disable_packages
                .iter()
                .map(|pkg| format!("pm disable-user --user 0 {}", pkg))
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }
}

/// Multi-step protocols reachable from the preset menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationKind {
    ReinstallAndLaunch,
}

impl OrchestrationKind {
    pub fn id(&self) -> &'static str {
        match self {
            OrchestrationKind::ReinstallAndLaunch => "soft_update_refresh",
        }
    }
}

/// Operator-facing catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetInfo {
    pub id: String,
    pub kind: PresetKind,
    pub description: String,
}

/// Which layer a catalog entry routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    Fcm,
    Shell,
    Orchestration,
}

/// Enumerate the full preset catalog for operator UIs
pub fn catalog() -> Vec<PresetInfo> {
    let entry = |id: &str, kind: PresetKind, description: &str| PresetInfo {
        id: id.to_string(),
        kind,
        description: description.to_string(),
    };

    vec![
        entry("ping", PresetKind::Fcm, "Connectivity check"),
        entry("ring", PresetKind::Fcm, "Ring the device for a duration"),
        entry("reboot", PresetKind::Fcm, "Reboot the device"),
        entry("launch_app", PresetKind::Fcm, "Launch an app by package"),
        entry("force_stop_app", PresetKind::Fcm, "Force-stop an app by package"),
        entry("clear_app_data", PresetKind::Fcm, "Clear an app's data"),
        entry("set_dnd", PresetKind::Fcm, "Toggle do-not-disturb"),
        entry("exempt_unity_app", PresetKind::Fcm, "Exempt the Unity app from battery limits"),
        entry("enable_stay_awake", PresetKind::Fcm, "Keep the screen on while powered"),
        entry("reboot_shell", PresetKind::Shell, "Reboot via the shell channel"),
        entry("uptime", PresetKind::Shell, "Report device uptime"),
        entry("disable_package_list", PresetKind::Shell, "Disable the configured package list"),
        entry(
            "soft_update_refresh",
            PresetKind::Orchestration,
            "Reinstall the managed app and relaunch it",
        ),
    ]
}
