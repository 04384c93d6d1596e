//! Metrics for generation runs.
//!
//! OpenTelemetry instruments labeled by generation kind. Nothing is exported unless the
//! host application installs a meter provider.

use atelier_core::GenerationKind;
use atelier_error::FailureKind;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::OnceLock;

static METRICS: OnceLock<GenerationMetrics> = OnceLock::new();

/// Counters and timings for orchestrated generations.
#[derive(Clone)]
pub struct GenerationMetrics {
    /// Meter handle kept alive for metric instruments
    _meter: Meter,
    /// Generations started
    pub requests: Counter<u64>,
    /// Generations that ended without an artifact
    pub failures: Counter<u64>,
    /// Wall time from bind to terminal state, in seconds
    pub duration: Histogram<f64>,
}

impl GenerationMetrics {
    fn init() -> Self {
        let meter = global::meter("atelier_generation");

        Self {
            _meter: meter.clone(),
            requests: meter
                .u64_counter("generation.requests")
                .with_description("Generations started")
                .build(),
            failures: meter
                .u64_counter("generation.failures")
                .with_description("Generations that ended without an artifact")
                .build(),
            duration: meter
                .f64_histogram("generation.duration")
                .with_unit("seconds")
                .with_description("Generation wall time")
                .build(),
        }
    }

    /// Get the global generation metrics instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    /// Record a generation start.
    pub fn record_request(&self, kind: GenerationKind) {
        self.requests
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }

    /// Record a finished generation.
    pub fn record_outcome(&self, kind: GenerationKind, failure: Option<FailureKind>, secs: f64) {
        let kind_label = KeyValue::new("kind", kind.to_string());
        self.duration.record(secs, std::slice::from_ref(&kind_label));
        if let Some(failure) = failure {
            self.failures.add(
                1,
                &[kind_label, KeyValue::new("failure", failure.to_string())],
            );
        }
    }
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::get().clone()
    }
}
