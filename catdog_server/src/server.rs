use crate::{
    config::Config, feedback::FeedbackRecorder, jobs::JobOrchestrator,
    metrics_store::MetricsStore, prediction::PredictionService, routes::api_routes,
    telemetry::Telemetry,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{path::PathBuf, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub prediction_service: Arc<PredictionService>,
    pub feedback: Arc<FeedbackRecorder>,
    pub metrics_store: Arc<MetricsStore>,
    pub jobs: JobOrchestrator,
    pub metrics_artifact: Arc<PathBuf>,
    pub telemetry: Arc<Telemetry>,
}

/// `max_body_bytes` replaces axum's 2 MB default so full-size photos can be uploaded.
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let metrics_layer = HttpMetricsLayerBuilder::new().build();
        let router = build_router(state, config.server.max_upload_bytes).layer(metrics_layer);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self, shutdown_rx: Receiver<()>) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
