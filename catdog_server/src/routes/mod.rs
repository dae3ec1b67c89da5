mod feedback;
mod health;
mod metrics;
mod performance;
mod predict;
mod retrain;
mod telemetry;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/telemetry", get(telemetry::telemetry_handler))
        .route("/predict/", post(predict::predict))
        .route("/performance/", get(performance::performance))
        .route("/metrics/", get(metrics::pipeline_metrics))
        .route("/feedback/", post(feedback::feedback))
        .route("/retrain/", post(retrain::retrain))
        .route("/training-status/{job_id}", get(retrain::training_status))
        .route("/training-jobs/", get(retrain::training_jobs))
}

#[cfg(test)]
mod tests {
    use crate::{
        feedback::FeedbackRecorder,
        jobs::{
            tests::{registry, FixedLoader},
            JobOrchestrator,
        },
        metrics_store::MetricsStore,
        pipeline::tests::ScriptedPipeline,
        prediction::{tests::png_bytes, PredictionService},
        server::{build_router, SharedState},
        telemetry::Telemetry,
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use catdog_model::preprocess::ImageSize;
    use http_body_util::BodyExt;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use serde_json::{json, Value};
    use std::{io::Cursor, path::PathBuf, sync::Arc, time::Duration};
    use tower::ServiceExt;

    const BOUNDARY: &str = "catdogboundary";
    const UPLOAD_LIMIT: usize = 25 * 1024 * 1024;

    struct TestApp {
        router: Router,
        _artifact_dir: tempfile::TempDir,
        artifact_path: PathBuf,
    }

    fn test_app(score: f32, pipeline: ScriptedPipeline) -> TestApp {
        test_app_with_limit(score, pipeline, UPLOAD_LIMIT)
    }

    fn test_app_with_limit(score: f32, pipeline: ScriptedPipeline, upload_limit: usize) -> TestApp {
        let registry = registry(score);
        let store = Arc::new(MetricsStore::default());
        let artifact_dir = tempfile::tempdir().unwrap();
        let artifact_path = artifact_dir.path().join("metrics.json");

        let state = SharedState {
            prediction_service: Arc::new(PredictionService::new(
                registry.clone(),
                store.clone(),
                ImageSize::default(),
            )),
            feedback: Arc::new(FeedbackRecorder::new(store.clone())),
            metrics_store: store,
            jobs: JobOrchestrator::new(
                registry,
                Arc::new(pipeline),
                Arc::new(FixedLoader {
                    score: 0.9,
                    fail: false,
                }),
                PathBuf::from("retrained.onnx"),
            ),
            metrics_artifact: Arc::new(artifact_path.clone()),
            telemetry: Arc::new(Telemetry::new().unwrap()),
        };

        TestApp {
            router: build_router(state, upload_limit),
            _artifact_dir: artifact_dir,
            artifact_path,
        }
    }

    fn multipart_request(content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"pet.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// PNG filled with hashed pixels so it barely compresses.
    fn noisy_png(side: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(side, side, |x, y| {
            let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
            h ^= h >> 15;
            h = h.wrapping_mul(0x2C1B_3C6D);
            h ^= h >> 12;
            Rgb([h as u8, (h >> 8) as u8, (h >> 16) as u8])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_predict_then_feedback_updates_accuracy() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, body) = send(&app, multipart_request("image/png", &png_bytes())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "pred_1");
        assert_eq!(body["prediction"], "cat");
        assert!(body["confidence"].as_f64().unwrap() >= 0.5);
        assert!(body["raw_prediction"].as_f64().is_some());
        assert!(body["processing_time"].as_f64().is_some());

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/feedback/",
                json!({"prediction_id": "pred_1", "ground_truth": "dog"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Feedback recorded successfully");

        let (status, body) = send(&app, get("/performance/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_predictions"], 1);
        assert_eq!(body["accuracy"], 0.0);
        assert_eq!(body["class_distribution"]["cat"], 1);
        assert_eq!(body["recent_predictions"][0]["filename"], "pet.png");
        assert_eq!(body["recent_predictions"][0]["ground_truth"], "dog");
    }

    #[tokio::test]
    async fn test_predict_rejects_non_images() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, body) = send(&app, multipart_request("text/plain", b"hello")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "File must be an image");
        let (status, _) = send(&app, get("/performance/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_predict_accepts_photos_over_two_megabytes() {
        let app = test_app(0.7, ScriptedPipeline::default());
        let photo = noisy_png(1100);
        assert!(photo.len() > 2 * 1024 * 1024);

        let (status, body) = send(&app, multipart_request("image/png", &photo)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "dog");
    }

    #[tokio::test]
    async fn test_predict_over_limit_is_payload_too_large() {
        let app = test_app_with_limit(0.7, ScriptedPipeline::default(), 64 * 1024);
        let photo = noisy_png(256);
        assert!(photo.len() > 64 * 1024);

        let (status, body) = send(&app, multipart_request("image/png", &photo)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["detail"].as_str().unwrap().starts_with("Uploaded file is too large"));
        let (status, _) = send(&app, get("/performance/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_predict_undecodable_image() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, body) = send(&app, multipart_request("image/jpeg", b"not a jpeg")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Error processing image"));
    }

    #[tokio::test]
    async fn test_history_keeps_last_hundred() {
        let app = test_app(0.8, ScriptedPipeline::default());
        let image = png_bytes();

        for _ in 0..101 {
            let (status, _) = send(&app, multipart_request("image/png", &image)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, get("/performance/")).await;
        assert_eq!(body["total_predictions"], 100);
        assert_eq!(body["recent_predictions"].as_array().unwrap().len(), 10);
        assert_eq!(body["recent_predictions"][9]["id"], "pred_101");

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/feedback/",
                json!({"prediction_id": "pred_1", "ground_truth": "dog"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_feedback_validation() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/feedback/",
                json!({"prediction_id": "pred_1", "ground_truth": "ferret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/feedback/",
                json!({"prediction_id": "pred_1", "ground_truth": "cat"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Prediction with ID pred_1 not found");
    }

    #[tokio::test]
    async fn test_pipeline_metrics_passthrough() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, _) = send(&app, get("/metrics/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        std::fs::write(&app.artifact_path, r#"{"val_accuracy": 0.88}"#).unwrap();
        let (status, body) = send(&app, get("/metrics/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"val_accuracy": 0.88}));

        std::fs::write(&app.artifact_path, "{broken").unwrap();
        let (status, _) = send(&app, get("/metrics/")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn poll_until_finished(app: &TestApp, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, get(&format!("/training-status/{job_id}"))).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] != "running" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never finished");
    }

    #[tokio::test]
    async fn test_retrain_failure_is_reported_through_status() {
        let app = test_app(
            0.2,
            ScriptedPipeline {
                fail_reproduce: true,
                ..Default::default()
            },
        );

        let (status, body) = send(&app, json_request("POST", "/retrain/", json!({"force": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "started");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let job = poll_until_finished(&app, &job_id).await;
        assert_eq!(job["status"], "failed");
        assert!(!job["error"].as_str().unwrap().is_empty());

        let (_, health) = send(&app, get("/health")).await;
        assert_eq!(health["model"], "initial.onnx");
    }

    #[tokio::test]
    async fn test_retrain_success_swaps_model() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let request = Request::builder()
            .method("POST")
            .uri("/retrain/")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let job = poll_until_finished(&app, &job_id).await;
        assert_eq!(job["status"], "completed");
        assert_eq!(job["force"], false);
        assert!(job["completed_at"].is_string());

        let (_, jobs) = send(&app, get("/training-jobs/")).await;
        assert_eq!(jobs[&job_id]["status"], "completed");

        let (_, health) = send(&app, get("/health")).await;
        assert_eq!(health["model"], "retrained.onnx");

        let (_, prediction) = send(&app, multipart_request("image/png", &png_bytes())).await;
        assert_eq!(prediction["prediction"], "dog");
    }

    #[tokio::test]
    async fn test_retrain_rejects_malformed_body() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let request = Request::builder()
            .method("POST")
            .uri("/retrain/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"force\": \"yes\"}"))
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid retrain request"));
        let (_, jobs) = send(&app, get("/training-jobs/")).await;
        assert_eq!(jobs, json!({}));
    }

    #[tokio::test]
    async fn test_unknown_training_job() {
        let app = test_app(0.2, ScriptedPipeline::default());

        let (status, _) = send(&app, get("/training-status/job_missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, get("/training-jobs/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_telemetry_endpoint() {
        let app = test_app(0.2, ScriptedPipeline::default());
        send(&app, get("/performance/")).await;

        let response = app.router.clone().oneshot(get("/telemetry")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("requests_total"));
    }
}
