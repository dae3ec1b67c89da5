use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};

/// Upper bounds, in milliseconds, of the prediction-duration buckets.
const PREDICTION_BUCKETS_MS: [f64; 12] = [
    5.0, 10.0, 20.0, 35.0, 50.0, 75.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 2500.0,
];

pub struct Telemetry {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    prediction_counter: Counter<u64>,
    retrain_counter: Counter<u64>,
    registry: Registry,
    _provider: SdkMeterProvider,
}

impl Telemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| prometheus::Error::Msg(e.to_string()))?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("catdog_server");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(PREDICTION_BUCKETS_MS.to_vec())
            .with_description("Duration of preprocessing and inference in milliseconds")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Predictions served, by label")
            .build();

        let retrain_counter = meter
            .u64_counter("retrain_jobs_started_total")
            .with_description("Retraining jobs started")
            .build();

        Ok(Telemetry {
            request_counter,
            prediction_duration,
            prediction_counter,
            retrain_counter,
            registry,
            _provider: provider,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction(&self, label: &str, duration_ms: u64) {
        let attributes = [KeyValue::new("label", label.to_string())];
        self.prediction_counter.add(1, &attributes);
        self.prediction_duration.record(duration_ms, &attributes);
    }

    pub fn record_retrain(&self, force: bool) {
        let attributes = [KeyValue::new("force", force)];
        self.retrain_counter.add(1, &attributes);
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_buckets_are_increasing() {
        assert!(PREDICTION_BUCKETS_MS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_prediction_duration_is_bucketed() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.record_prediction("dog", 42);

        let text = telemetry.encode().unwrap();

        assert!(text.contains("prediction_duration_ms"));
        assert!(text.contains("le=\"50\""));
    }

    #[test]
    fn test_encode_exposes_counters() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.record_request("/predict/");
        telemetry.record_prediction("cat", 12);
        telemetry.record_retrain(true);

        let text = telemetry.encode().unwrap();

        assert!(text.contains("requests_total"));
        assert!(text.contains("predictions_total"));
        assert!(text.contains("retrain_jobs_started_total"));
    }
}
