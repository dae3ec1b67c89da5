use crate::{error::ApiError, metrics_store::PerformanceSummary, server::SharedState};
use axum::{extract::State, response::Json};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn performance(
    State(state): State<SharedState>,
) -> Result<Json<PerformanceSummary>, ApiError> {
    state.telemetry.record_request("/performance/");
    let summary = state.metrics_store.aggregate()?;
    Ok(Json(summary))
}
