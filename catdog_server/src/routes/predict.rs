use crate::{
    error::ApiError,
    prediction::{PredictionResult, Upload},
    server::SharedState,
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use bytes::Bytes;
use tracing::instrument;

const FILE_FIELD: &str = "file";

fn bad_multipart(err: MultipartError) -> ApiError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(format!(
            "Uploaded file is too large: {}",
            err.body_text()
        )),
        _ => ApiError::InvalidInput(format!("Invalid multipart body: {}", err.body_text())),
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResult>, ApiError> {
    state.telemetry.record_request("/predict/");

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let image_data = field.bytes().await.map_err(bad_multipart)?;

        return classify(&state, filename, content_type, image_data).await;
    }

    Err(ApiError::InvalidInput("No file uploaded".to_string()))
}

async fn classify(
    state: &SharedState,
    filename: Option<String>,
    content_type: Option<String>,
    image_data: Bytes,
) -> Result<Json<PredictionResult>, ApiError> {
    let service = state.prediction_service.clone();

    let result = tokio::task::spawn_blocking(move || {
        service.predict(Upload {
            filename: filename.as_deref(),
            content_type: content_type.as_deref(),
            image_data: &image_data,
        })
    })
    .await
    .map_err(|e| ApiError::Processing(format!("Error processing image: {}", e)))??;

    state.telemetry.record_prediction(
        result.prediction.as_str(),
        (result.processing_time * 1000.0) as u64,
    );

    Ok(Json(result))
}
