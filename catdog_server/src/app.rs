use crate::config::Config;
use crate::feedback::FeedbackRecorder;
use crate::jobs::JobOrchestrator;
use crate::metrics_store::MetricsStore;
use crate::pipeline::DvcPipeline;
use crate::prediction::PredictionService;
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Telemetry;

use catdog_model::{ModelHandle, ModelLoader, ModelRegistry, OrtModelLoader};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    if let Err(e) = config.model.validate() {
        tracing::error!("Invalid model configuration: {}", e);
        return Err(e.into());
    }

    let model_path = config.model.get_path();
    let loader = Arc::new(OrtModelLoader::new(config.model.num_instances));
    let classifier = match loader.load(&model_path) {
        Ok(classifier) => classifier,
        Err(e) => {
            tracing::error!("Failed to load model {}: {}", model_path.display(), e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Loaded model from {}", model_path.display());

    let registry = Arc::new(ModelRegistry::new(ModelHandle::new(
        classifier,
        model_path.clone(),
    )));
    let metrics_store = Arc::new(MetricsStore::new(config.metrics.capacity));

    let prediction_service = Arc::new(PredictionService::new(
        registry.clone(),
        metrics_store.clone(),
        config.model.image_size(),
    ));
    let feedback = Arc::new(FeedbackRecorder::new(metrics_store.clone()));
    let jobs = JobOrchestrator::new(
        registry,
        Arc::new(DvcPipeline::new(&config.pipeline)),
        loader,
        model_path,
    );

    let telemetry = match Telemetry::new() {
        Ok(telemetry) => Arc::new(telemetry),
        Err(e) => {
            tracing::error!("Failed to initialize telemetry: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let state = SharedState {
        prediction_service,
        feedback,
        metrics_store,
        jobs,
        metrics_artifact: Arc::new(config.metrics.artifact_path.clone()),
        telemetry,
    };

    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::error!("Server stopped with an error: {}", e),
        Err(e) => tracing::error!("Server task panicked: {}", e),
        Ok(Ok(())) => tracing::info!("Server stopped"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
