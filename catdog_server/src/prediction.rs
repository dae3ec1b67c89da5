use crate::metrics_store::{MetricsStore, NewPrediction};
use catdog_model::{
    preprocess::{preprocess_image, ImageSize, PreprocessError},
    Classification, InvalidScore, Label, ModelError, ModelRegistry,
};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("File must be an image")]
    NotAnImage,
    #[error("Error processing image: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Error processing image: {0}")]
    Inference(#[from] ModelError),
    #[error("Error processing image: {0}")]
    InvalidScore(#[from] InvalidScore),
}

/// One uploaded file as received from the client.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub image_data: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub id: String,
    pub prediction: Label,
    pub confidence: f32,
    pub raw_prediction: f32,
    pub processing_time: f64,
}

pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    store: Arc<MetricsStore>,
    image_size: ImageSize,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>, store: Arc<MetricsStore>, image_size: ImageSize) -> Self {
        Self {
            registry,
            store,
            image_size,
        }
    }

    pub fn active_model(&self) -> PathBuf {
        self.registry.get().path().to_path_buf()
    }

    /// Classifies one upload and records it. Nothing is recorded on failure.
    #[instrument(skip(self, upload), fields(filename = upload.filename))]
    pub fn predict(&self, upload: Upload<'_>) -> Result<PredictionResult, PredictionError> {
        let is_image = upload
            .content_type
            .is_some_and(|content_type| content_type.starts_with("image/"));
        if !is_image {
            return Err(PredictionError::NotAnImage);
        }

        let started = Instant::now();
        let input = preprocess_image(upload.image_data, self.image_size)?;

        let model = self.registry.get();
        let score = model.classifier().classify(&input)?;
        let classification = Classification::from_score(score)?;
        let processing_time = started.elapsed().as_secs_f64();

        let record = self.store.record(NewPrediction {
            filename: upload.filename.unwrap_or("unknown").to_string(),
            label: classification.label,
            confidence: classification.confidence,
            processing_time,
        });

        tracing::debug!(
            "Prediction {}: {} ({:.3}) with model {} in {:.4}s",
            record.id,
            classification.label,
            classification.confidence,
            model.path().display(),
            processing_time
        );

        Ok(PredictionResult {
            id: record.id,
            prediction: classification.label,
            confidence: classification.confidence,
            raw_prediction: classification.raw_score,
            processing_time,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use catdog_model::{Classifier, ModelHandle};
    use image::{ImageBuffer, Rgb};
    use ndarray::{Array, Ix4};
    use std::io::Cursor;

    pub(crate) struct FixedScore(pub f32);

    impl Classifier for FixedScore {
        fn classify(&self, _input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
            Ok(self.0)
        }
    }

    struct BrokenModel;

    impl Classifier for BrokenModel {
        fn classify(&self, _input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
            Err(ModelError::Inference("session exploded".to_string()))
        }
    }

    pub(crate) fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 48, Rgb([120, 80, 40]));
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), image::ImageFormat::Png)
            .unwrap();
        image_data
    }

    fn build_service(classifier: Arc<dyn Classifier>) -> (PredictionService, Arc<MetricsStore>) {
        let registry = Arc::new(ModelRegistry::new(ModelHandle::new(classifier, "model.onnx")));
        let store = Arc::new(MetricsStore::default());
        let service = PredictionService::new(registry, store.clone(), ImageSize::default());
        (service, store)
    }

    fn upload(image_data: &[u8]) -> Upload<'_> {
        Upload {
            filename: Some("whiskers.png"),
            content_type: Some("image/png"),
            image_data,
        }
    }

    #[test]
    fn test_predict_cat() {
        let (service, store) = build_service(Arc::new(FixedScore(0.2)));
        let image_data = png_bytes();

        let result = service.predict(upload(&image_data)).unwrap();

        assert_eq!(result.id, "pred_1");
        assert_eq!(result.prediction, Label::Cat);
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert!((result.raw_prediction - 0.2).abs() < 1e-6);
        assert!(result.processing_time >= 0.0);

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "whiskers.png");
        assert_eq!(records[0].label, Label::Cat);
    }

    #[test]
    fn test_predict_dog_and_unknown_filename() {
        let (service, store) = build_service(Arc::new(FixedScore(0.93)));
        let image_data = png_bytes();

        let result = service
            .predict(Upload {
                filename: None,
                ..upload(&image_data)
            })
            .unwrap();

        assert_eq!(result.prediction, Label::Dog);
        assert!(result.confidence >= 0.5);
        assert_eq!(store.snapshot()[0].filename, "unknown");
    }

    #[test]
    fn test_rejects_non_image_content_type() {
        let (service, store) = build_service(Arc::new(FixedScore(0.9)));
        let image_data = png_bytes();

        let result = service.predict(Upload {
            content_type: Some("text/plain"),
            ..upload(&image_data)
        });

        assert!(matches!(result, Err(PredictionError::NotAnImage)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failures_record_nothing() {
        let (service, store) = build_service(Arc::new(FixedScore(0.9)));
        let garbage = service.predict(upload(b"not really a png"));
        assert!(matches!(garbage, Err(PredictionError::Preprocess(_))));

        let (broken, broken_store) = build_service(Arc::new(BrokenModel));
        let image_data = png_bytes();
        let err = broken.predict(upload(&image_data)).unwrap_err();
        assert!(matches!(err, PredictionError::Inference(_)));
        assert!(err.to_string().contains("session exploded"));

        assert!(store.is_empty());
        assert!(broken_store.is_empty());
    }
}
