use crate::{error::ApiError, server::SharedState};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub prediction_id: String,
    pub ground_truth: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    message: &'static str,
}

#[instrument(skip(state))]
pub async fn feedback(
    State(state): State<SharedState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    state.telemetry.record_request("/feedback/");
    state
        .feedback
        .submit(&request.prediction_id, &request.ground_truth)?;

    Ok(Json(FeedbackResponse {
        message: "Feedback recorded successfully",
    }))
}
