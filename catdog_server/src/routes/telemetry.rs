use crate::{error::ApiError, server::SharedState};
use axum::extract::State;

pub async fn telemetry_handler(State(state): State<SharedState>) -> Result<String, ApiError> {
    state
        .telemetry
        .encode()
        .map_err(|e| ApiError::Processing(format!("Failed to encode telemetry: {}", e)))
}
