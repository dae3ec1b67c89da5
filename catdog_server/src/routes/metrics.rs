use crate::{artifact::read_metrics_artifact, error::ApiError, server::SharedState};
use axum::{extract::State, response::Json};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn pipeline_metrics(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.telemetry.record_request("/metrics/");
    let metrics = read_metrics_artifact(&state.metrics_artifact).await?;
    Ok(Json(metrics))
}
