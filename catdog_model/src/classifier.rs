use ndarray::{Array, Ix4};
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model produced no output")]
    EmptyOutput,
}

/// A binary classifier returning P(dog) for one preprocessed image.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, input: &Array<f32, Ix4>) -> Result<f32, ModelError>;
}

/// Builds a fresh classifier from a model artifact on disk.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelError>;
}
