//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::compose::{CommandPayload, Composer};
use crate::command::presets::PresetInfo;
use crate::errors::EngineError;
use crate::models::device::{Device, TargetSpec};
use crate::models::execution::{DeviceResult, DeviceResultStatus, DispatchMode, ExecutionStatus};
use crate::models::orchestration::{
    OverallStatus, ReinstallStats, ReinstallStatus, RestartStats, RestartStatus,
};
use crate::orchestrate::restart::{RestartRequest, RestartScope};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        EngineError::ValidationError(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::HttpError(_) | EngineError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn operator_from(headers: &HeaderMap) -> String {
    headers
        .get("x-operator")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("operator")
        .to_string()
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "drover".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Fleet listing response
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
    pub total: usize,
}

/// Fleet listing handler
pub async fn devices_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<DevicesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let devices = state.engine.fleet().await.map_err(error_response)?;
    let total = devices.len();
    Ok(Json(DevicesResponse { devices, total }))
}

/// Preset catalog response
#[derive(Debug, Serialize)]
pub struct PresetsResponse {
    pub presets: Vec<PresetInfo>,
    pub total: usize,
}

/// Preset catalog handler
pub async fn presets_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let presets = state.engine.catalog();
    let total = presets.len();
    Json(PresetsResponse { presets, total })
}

/// Target selector body
#[derive(Debug, Clone, Deserialize)]
pub struct TargetsBody {
    #[serde(default)]
    pub all: Option<bool>,

    #[serde(default)]
    pub filter: Option<FilterBody>,

    #[serde(default)]
    pub aliases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterBody {
    #[serde(default)]
    pub online: Option<bool>,
}

impl TargetsBody {
    fn to_spec(&self) -> Result<TargetSpec, EngineError> {
        if self.all == Some(true) {
            Ok(TargetSpec::All)
        } else if let Some(filter) = &self.filter {
            Ok(TargetSpec::Filter {
                online_only: filter.online.unwrap_or(false),
            })
        } else if let Some(aliases) = &self.aliases {
            Ok(TargetSpec::Aliases {
                aliases: aliases.clone(),
            })
        } else {
            Err(EngineError::ValidationError(
                "targets must specify all, filter, or aliases".to_string(),
            ))
        }
    }
}

/// Dispatch request
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub mode: DispatchMode,
    pub targets: TargetsBody,

    #[serde(default)]
    pub payload: Option<Value>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub dry_run: bool,
}

impl DispatchRequest {
    fn build_payload(&self) -> Result<CommandPayload, EngineError> {
        match self.mode {
            DispatchMode::Fcm => match &self.payload {
                Some(value) => Composer::validate_fcm(value.clone()),
                None => Err(EngineError::ValidationError(
                    "payload is required for push dispatch".to_string(),
                )),
            },
            DispatchMode::Shell => match &self.command {
                Some(command) => Composer::compose_shell(command),
                None => Err(EngineError::ValidationError(
                    "command is required for shell dispatch".to_string(),
                )),
            },
        }
    }
}

/// Dispatch response
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub exec_id: String,
    pub sent_count: usize,
}

/// Dry-run response
#[derive(Debug, Serialize)]
pub struct DryRunResponse {
    pub estimated_count: usize,
    pub sample_aliases: Vec<String>,
    pub requires_confirmation: bool,
}

/// Dispatch handler
pub async fn dispatch_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let spec = request.targets.to_spec().map_err(error_response)?;

    if request.dry_run {
        let preview = state.engine.preview(&spec).await.map_err(error_response)?;
        return Ok(Json(DryRunResponse {
            estimated_count: preview.estimated_count,
            sample_aliases: preview.sample_aliases,
            requires_confirmation: preview.requires_confirmation,
        })
        .into_response());
    }

    let payload = request.build_payload().map_err(error_response)?;
    let created_by = operator_from(&headers);
    let view = state
        .engine
        .dispatch(&spec, &payload, &created_by)
        .await
        .map_err(error_response)?;

    Ok(Json(DispatchResponse {
        exec_id: view.exec_id,
        sent_count: view.stats.sent,
    })
    .into_response())
}

/// Execution stats body
#[derive(Debug, Serialize)]
pub struct ExecStatsBody {
    pub sent_count: usize,
    pub acked_count: usize,
    pub error_count: usize,
}

/// Execution status response
#[derive(Debug, Serialize)]
pub struct ExecStatusResponse {
    pub status: ExecutionStatus,
    pub stats: ExecStatsBody,
    pub results: Vec<DeviceResult>,
}

/// Execution status handler
pub async fn exec_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(exec_id): Path<String>,
) -> Result<Json<ExecStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let view = state
        .engine
        .execution(&exec_id)
        .await
        .map_err(error_response)?;

    Ok(Json(ExecStatusResponse {
        status: view.status,
        stats: ExecStatsBody {
            sent_count: view.stats.sent,
            acked_count: view.stats.acked,
            error_count: view.stats.errors,
        },
        results: view.results,
    }))
}

/// Execution export handler
pub async fn exec_export_handler(
    State(state): State<Arc<ServerState>>,
    Path(exec_id): Path<String>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let text = state.engine.export(&exec_id).await.map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], text).into_response())
}

/// Stop watching response
#[derive(Debug, Serialize)]
pub struct StopWatchResponse {
    pub stopped: bool,
}

/// Stop watching handler
///
/// Stops the local poll only; the dispatched command cannot be recalled.
pub async fn exec_stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(exec_id): Path<String>,
) -> impl IntoResponse {
    let stopped = state.engine.stop_watch(&exec_id).await;
    Json(StopWatchResponse { stopped })
}

/// Restart dispatch request
#[derive(Debug, Deserialize)]
pub struct RestartDispatchRequest {
    pub package_name: String,

    #[serde(default)]
    pub online_only: bool,

    pub scope_type: ScopeType,

    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    All,
    Aliases,
}

/// Per-phase sent counter
#[derive(Debug, Serialize)]
pub struct PhaseSent {
    pub sent: usize,
}

/// Restart dispatch stats
#[derive(Debug, Serialize)]
pub struct RestartDispatchStats {
    pub force_stop: PhaseSent,
    pub launch: PhaseSent,
}

/// Restart dispatch response
#[derive(Debug, Serialize)]
pub struct RestartDispatchResponse {
    pub restart_id: String,
    pub stats: RestartDispatchStats,
}

/// Restart dispatch handler
pub async fn restart_dispatch_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<RestartDispatchRequest>,
) -> Result<Json<RestartDispatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let created_by = operator_from(&headers);
    let orch = state
        .engine
        .restart_app(
            RestartRequest {
                package_name: request.package_name,
                online_only: request.online_only,
                scope: match request.scope_type {
                    ScopeType::All => RestartScope::All,
                    ScopeType::Aliases => RestartScope::Aliases,
                },
                aliases: request.targets.unwrap_or_default(),
            },
            &created_by,
        )
        .await
        .map_err(error_response)?;

    let sent = |status: DeviceResultStatus| status != DeviceResultStatus::Pending;
    Ok(Json(RestartDispatchResponse {
        restart_id: orch.restart_id.clone(),
        stats: RestartDispatchStats {
            force_stop: PhaseSent {
                sent: orch.devices.iter().filter(|d| sent(d.force_stop)).count(),
            },
            launch: PhaseSent {
                sent: orch.devices.iter().filter(|d| sent(d.launch)).count(),
            },
        },
    }))
}

/// Per-phase status body
#[derive(Debug, Serialize)]
pub struct PhaseStatus {
    pub status: DeviceResultStatus,
}

/// Per-device restart body
#[derive(Debug, Serialize)]
pub struct RestartDeviceBody {
    pub device_id: String,
    pub alias: String,
    pub force_stop: PhaseStatus,
    pub launch: PhaseStatus,
    pub overall_status: OverallStatus,
}

/// Restart status response
#[derive(Debug, Serialize)]
pub struct RestartStatusResponse {
    pub status: RestartStatus,
    pub stats: RestartStats,
    pub devices: Vec<RestartDeviceBody>,
}

/// Restart status handler
pub async fn restart_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(restart_id): Path<String>,
) -> Result<Json<RestartStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let orch = state
        .engine
        .restart_status(&restart_id)
        .await
        .map_err(error_response)?;

    Ok(Json(RestartStatusResponse {
        status: orch.status,
        stats: orch.stats(),
        devices: orch
            .devices
            .iter()
            .map(|device| RestartDeviceBody {
                device_id: device.device_id.clone(),
                alias: device.alias.clone(),
                force_stop: PhaseStatus {
                    status: device.force_stop,
                },
                launch: PhaseStatus {
                    status: device.launch,
                },
                overall_status: device.overall,
            })
            .collect(),
    }))
}

/// Reinstall dispatch request
#[derive(Debug, Deserialize)]
pub struct ReinstallDispatchRequest {
    pub device_ids: Vec<String>,

    #[serde(default)]
    pub dry_run: bool,
}

/// Reinstall dispatch response
#[derive(Debug, Serialize)]
pub struct ReinstallDispatchResponse {
    pub exec_id: String,
    pub stats: PhaseSent,
}

/// Reinstall dry-run response
#[derive(Debug, Serialize)]
pub struct ReinstallDryRunResponse {
    pub estimated_count: usize,
}

/// Reinstall dispatch handler
pub async fn reinstall_dispatch_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<ReinstallDispatchRequest>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    if request.dry_run {
        let estimated_count = state
            .engine
            .reinstall_preview(&request.device_ids)
            .await
            .map_err(error_response)?;
        return Ok(Json(ReinstallDryRunResponse { estimated_count }).into_response());
    }

    let created_by = operator_from(&headers);
    let orch = state
        .engine
        .reinstall_dispatch(&request.device_ids, &created_by)
        .await
        .map_err(error_response)?;

    let sent = orch
        .devices
        .iter()
        .filter(|d| d.reinstall != DeviceResultStatus::Pending)
        .count();
    Ok(Json(ReinstallDispatchResponse {
        exec_id: orch.exec_id.clone(),
        stats: PhaseSent { sent },
    })
    .into_response())
}

/// Reinstall status response
#[derive(Debug, Serialize)]
pub struct ReinstallStatusResponse {
    pub status: ReinstallStatus,
    pub stats: ReinstallStats,
}

/// Reinstall status handler
pub async fn reinstall_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(exec_id): Path<String>,
) -> Result<Json<ReinstallStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let orch = state
        .engine
        .reinstall_status(&exec_id)
        .await
        .map_err(error_response)?;

    Ok(Json(ReinstallStatusResponse {
        status: orch.status,
        stats: orch.stats(),
    }))
}
