use crate::{error::ApiError, jobs::TrainingJob, server::SharedState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Debug, Default, Deserialize)]
pub struct RetrainRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct RetrainResponse {
    status: &'static str,
    job_id: String,
    message: &'static str,
}

/// Accepts an empty body as `{"force": false}`.
#[instrument(skip(state, body))]
pub async fn retrain(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<RetrainResponse>, ApiError> {
    state.telemetry.record_request("/retrain/");

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RetrainRequest::default()
    } else {
        serde_json::from_slice::<RetrainRequest>(&body)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid retrain request: {}", e)))?
    };

    let job_id = state.jobs.start_job(request.force);
    state.telemetry.record_retrain(request.force);
    tracing::info!("Started training job {} (force: {})", job_id, request.force);

    Ok(Json(RetrainResponse {
        status: "started",
        job_id,
        message: "Model retraining started in the background",
    }))
}

#[instrument(skip(state))]
pub async fn training_status(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<Json<TrainingJob>, ApiError> {
    state.telemetry.record_request("/training-status/");
    Ok(Json(state.jobs.get_job(&job_id)?))
}

pub async fn training_jobs(State(state): State<SharedState>) -> Json<BTreeMap<String, TrainingJob>> {
    state.telemetry.record_request("/training-jobs/");
    Json(state.jobs.list_jobs())
}
