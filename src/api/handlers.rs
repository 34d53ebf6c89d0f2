use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::error::HearthError;
use crate::types::{DeploymentMode, ModeInfo, ReadOutcome, ServiceAvailability, SweepRequest, SyncReport, SyncStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: DeploymentMode,
    pub services: BTreeMap<String, ServiceAvailability>,
    pub version: &'static str,
}

/// Probes are TTL-bounded, so frequent polling does not reach the hardware
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    state.probe().probe_registered().await;

    Json(HealthResponse {
        status: "ok",
        mode: state.mode().current_mode(),
        services: state.registry().all(),
        version: crate::VERSION,
    })
}

pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync_status().await)
}

pub async fn mode(State(state): State<AppState>) -> Json<ModeInfo> {
    Json(state.mode().mode_info())
}

/// Body of `POST /sync`; every field optional, an empty body means defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub services: Option<Vec<String>>,
    #[serde(default)]
    pub include_authenticated: bool,
}

impl SyncRequestBody {
    pub fn into_request(self) -> SweepRequest {
        let services = match (self.service, self.services) {
            (None, None) => None,
            (single, many) => Some(single.into_iter().chain(many.unwrap_or_default()).collect()),
        };
        SweepRequest {
            services,
            include_authenticated: self.include_authenticated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SyncReport,
}

pub async fn trigger_sync(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<SyncResponse>> {
    let body: SyncRequestBody = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequestBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| HearthError::InvalidInput(format!("invalid sync request: {}", e)))?
    };

    // TTL-bounded; a cold or expired indicator must not cause a false 403
    state.probe().probe_indicators().await;

    let report = state.scheduler().trigger_now(body.into_request()).await?;
    Ok(Json(SyncResponse {
        success: report.success(),
        report,
    }))
}

pub async fn read_data(
    State(state): State<AppState>,
    Path((service, key)): Path<(String, String)>,
) -> ApiResult<Json<ReadOutcome>> {
    let adapter = state
        .adapters()
        .get(&service)
        .ok_or_else(|| {
            HearthError::InvalidInput(format!(
                "Unknown service '{}'. Known services: {}",
                service,
                state.adapters().names().join(", ")
            ))
        })?;

    Ok(Json(adapter.read(&key).await?))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not_found", "message": "Not found"})),
    )
}
