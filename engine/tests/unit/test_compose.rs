//! Command composition unit tests

use serde_json::json;

use drover::command::compose::{CommandPayload, CommandSelection, Composer};
use drover::command::presets::{
    catalog, FcmPreset, OrchestrationKind, PresetKind, ShellPreset,
};
use drover::errors::EngineError;
use drover::models::execution::DispatchMode;

#[test]
fn test_fcm_preset_payloads() {
    assert_eq!(FcmPreset::Ping.payload(), json!({ "command": "ping" }));
    assert_eq!(
        FcmPreset::Ring { duration_secs: 15 }.payload(),
        json!({ "command": "ring", "duration": 15 })
    );
    assert_eq!(
        FcmPreset::LaunchApp {
            package: "com.example.app".to_string()
        }
        .payload(),
        json!({ "command": "launch_app", "package": "com.example.app" })
    );
    assert_eq!(
        FcmPreset::SetDnd { enable: true }.payload(),
        json!({ "command": "set_dnd", "enable": true })
    );
}

#[test]
fn test_compose_fcm_rejects_invalid_json() {
    let result = Composer::compose_fcm("{not json");
    assert!(matches!(result, Err(EngineError::ValidationError(_))));
}

#[test]
fn test_compose_fcm_rejects_empty_payload() {
    let result = Composer::compose_fcm("");
    assert!(matches!(result, Err(EngineError::ValidationError(_))));
}

#[test]
fn test_compose_fcm_rejects_non_object() {
    let result = Composer::compose_fcm("[1, 2, 3]");
    assert!(matches!(result, Err(EngineError::ValidationError(_))));
}

#[test]
fn test_compose_fcm_accepts_object() {
    let payload = Composer::compose_fcm(r#"{"command": "ping"}"#).unwrap();
    assert_eq!(payload.mode(), DispatchMode::Fcm);
}

#[test]
fn test_compose_shell_rejects_empty_command() {
    assert!(matches!(
        Composer::compose_shell(""),
        Err(EngineError::ValidationError(_))
    ));
    assert!(matches!(
        Composer::compose_shell("   "),
        Err(EngineError::ValidationError(_))
    ));
}

#[test]
fn test_compose_shell_trims_command() {
    let payload = Composer::compose_shell("  uptime  ").unwrap();
    assert_eq!(payload, CommandPayload::Shell("uptime".to_string()));
    assert_eq!(payload.mode(), DispatchMode::Shell);
}

#[test]
fn test_disable_package_list_is_templated_from_settings() {
    let composer = Composer::new(vec![
        "com.vendor.bloat".to_string(),
        "com.vendor.updater".to_string(),
    ]);
    let payload = composer
        .payload_for(&CommandSelection::Shell(ShellPreset::DisablePackages))
        .unwrap()
        .unwrap();
    assert_eq!(
        payload,
        CommandPayload::Shell(
            "pm disable-user --user 0 com.vendor.bloat && pm disable-user --user 0 com.vendor.updater"
                .to_string()
        )
    );
}

#[test]
fn test_disable_package_list_requires_configured_packages() {
    let composer = Composer::new(Vec::new());
    let result = composer.payload_for(&CommandSelection::Shell(ShellPreset::DisablePackages));
    assert!(matches!(result, Err(EngineError::ValidationError(_))));
}

#[test]
fn test_sentinel_selection_has_no_payload() {
    let composer = Composer::new(Vec::new());
    let selection = CommandSelection::Orchestration(OrchestrationKind::ReinstallAndLaunch);
    assert!(composer.payload_for(&selection).unwrap().is_none());
}

#[test]
fn test_fcm_selection_builds_preset_payload() {
    let composer = Composer::new(Vec::new());
    let payload = composer
        .payload_for(&CommandSelection::Fcm(FcmPreset::Ping))
        .unwrap()
        .unwrap();
    assert_eq!(payload, CommandPayload::Fcm(json!({ "command": "ping" })));
}

#[test]
fn test_catalog_routes_sentinel_to_orchestration() {
    let entries = catalog();
    let sentinel = entries
        .iter()
        .find(|entry| entry.id == "soft_update_refresh")
        .expect("sentinel preset missing from catalog");
    assert_eq!(sentinel.kind, PresetKind::Orchestration);

    let ping = entries.iter().find(|entry| entry.id == "ping").unwrap();
    assert_eq!(ping.kind, PresetKind::Fcm);
}
