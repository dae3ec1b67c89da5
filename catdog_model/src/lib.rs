mod classifier;
mod label;
mod ort_service;
mod registry;

pub mod config;
pub mod preprocess;

pub use classifier::{Classifier, ModelError, ModelLoader};
pub use label::{Classification, InvalidScore, Label, ParseLabelError, DOG_THRESHOLD};
pub use ort_service::{OrtClassifier, OrtModelLoader};
pub use registry::{ModelHandle, ModelRegistry};
