use crate::{
    artifact::ArtifactError, feedback::FeedbackError, jobs::JobError, metrics_store::MetricsError,
    prediction::PredictionError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Request-path failures, grouped by how the client should react.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Processing(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::NotAnImage => ApiError::InvalidInput(err.to_string()),
            PredictionError::Preprocess(_)
            | PredictionError::Inference(_)
            | PredictionError::InvalidScore(_) => ApiError::Processing(err.to_string()),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::InvalidLabel(_) => ApiError::InvalidInput(err.to_string()),
            FeedbackError::UnknownPrediction(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Missing(_) => ApiError::NotFound(err.to_string()),
            ArtifactError::Read(_) | ArtifactError::Parse(_) => {
                ApiError::Processing(err.to_string())
            }
        }
    }
}
