use crate::metrics_store::MetricsStore;
use catdog_model::{Label, ParseLabelError};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeedbackError {
    #[error(transparent)]
    InvalidLabel(#[from] ParseLabelError),
    #[error("Prediction with ID {0} not found")]
    UnknownPrediction(String),
}

pub struct FeedbackRecorder {
    store: Arc<MetricsStore>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<MetricsStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub fn submit(&self, prediction_id: &str, ground_truth: &str) -> Result<(), FeedbackError> {
        let label: Label = ground_truth.parse()?;

        if !self.store.update_ground_truth(prediction_id, label) {
            return Err(FeedbackError::UnknownPrediction(prediction_id.to_string()));
        }

        tracing::debug!("Recorded ground truth {} for {}", label, prediction_id);
        Ok(())
    }
}
