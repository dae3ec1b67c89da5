use catdog_model::Label;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 100;
pub const RECENT_PREDICTIONS: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("No prediction data available yet")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    #[serde(rename = "prediction")]
    pub label: Label,
    pub confidence: f32,
    pub processing_time: f64,
    pub ground_truth: Option<Label>,
}

/// Fields supplied by the caller; id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub filename: String,
    pub label: Label,
    pub confidence: f32,
    pub processing_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_predictions: usize,
    pub avg_confidence: f64,
    pub avg_processing_time: f64,
    pub class_distribution: BTreeMap<Label, usize>,
    pub recent_predictions: Vec<PredictionRecord>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    records: VecDeque<PredictionRecord>,
    inserted: u64,
}

/// Bounded FIFO history of predictions.
///
/// Ids come from a counter of every record ever inserted, so they keep
/// increasing after the oldest entries are evicted.
#[derive(Debug)]
pub struct MetricsStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MetricsStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity),
                inserted: 0,
            }),
            capacity,
        }
    }

    pub fn record(&self, prediction: NewPrediction) -> PredictionRecord {
        let mut inner = self.inner.lock();
        inner.inserted += 1;

        let record = PredictionRecord {
            id: format!("pred_{}", inner.inserted),
            timestamp: Utc::now(),
            filename: prediction.filename,
            label: prediction.label,
            confidence: prediction.confidence,
            processing_time: prediction.processing_time,
            ground_truth: None,
        };

        inner.records.push_back(record.clone());
        while inner.records.len() > self.capacity {
            if let Some(evicted) = inner.records.pop_front() {
                tracing::debug!("Evicted prediction {}", evicted.id);
            }
        }

        record
    }

    pub fn snapshot(&self) -> Vec<PredictionRecord> {
        self.inner.lock().records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn aggregate(&self) -> Result<PerformanceSummary, MetricsError> {
        let inner = self.inner.lock();
        let records = &inner.records;
        if records.is_empty() {
            return Err(MetricsError::Empty);
        }

        let total = records.len();
        let mut confidence_sum = 0.0f64;
        let mut time_sum = 0.0f64;
        let mut class_distribution = BTreeMap::new();
        let mut labelled = 0usize;
        let mut correct = 0usize;

        for record in records {
            confidence_sum += f64::from(record.confidence);
            time_sum += record.processing_time;
            *class_distribution.entry(record.label).or_insert(0) += 1;

            if let Some(truth) = record.ground_truth {
                labelled += 1;
                if truth == record.label {
                    correct += 1;
                }
            }
        }

        let accuracy = (labelled > 0).then(|| correct as f64 / labelled as f64);
        let skip = total.saturating_sub(RECENT_PREDICTIONS);

        Ok(PerformanceSummary {
            total_predictions: total,
            avg_confidence: confidence_sum / total as f64,
            avg_processing_time: time_sum / total as f64,
            class_distribution,
            recent_predictions: records.iter().skip(skip).cloned().collect(),
            accuracy,
        })
    }

    /// Returns `false` when no retained record has this id.
    pub fn update_ground_truth(&self, id: &str, label: Label) -> bool {
        let mut inner = self.inner.lock();
        match inner.records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.ground_truth = Some(label);
                true
            }
            None => false,
        }
    }
}
