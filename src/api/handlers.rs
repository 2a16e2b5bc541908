//! REST endpoint handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::core::ResumeRequest;
use crate::domain::RunRecord;

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub date_label: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
}

/// POST /runs — create a run and start its pipeline
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ApiResult<Json<CreateRunResponse>> {
    if request.date_label.trim().is_empty() {
        return Err(ApiError::BadRequest("date_label must not be empty".to_string()));
    }

    let run_id = state.controller.create_run(request.date_label).await?;
    Ok(Json(CreateRunResponse { run_id }))
}

/// GET /runs/:id — current record
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunRecord>> {
    let record = state.controller.get_run(run_id).await?;
    Ok(Json(record))
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub status: &'static str,
    pub state: RunRecord,
}

/// POST /runs/:id/resume — apply a checkpoint decision
pub async fn resume_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<ResumeRequest>,
) -> ApiResult<Json<ResumeResponse>> {
    let outcome = state.controller.resume(run_id, request).await?;
    let status = if outcome.resumed { "resumed" } else { "unchanged" };
    Ok(Json(ResumeResponse {
        status,
        state: outcome.record,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "curio",
    })
}
