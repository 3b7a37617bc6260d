//! Latency recording.
//!
//! The engines report every completed logical operation to a [`MeasurementSink`]. The bundled
//! [`Measurements`] sink keeps a [`DDSketch`] of latencies per operation label, together with
//! failure counters broken down by status code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use sketches_ddsketch::DDSketch;

use crate::backend::{BackendResult, status_code};

/// Receives latency samples tagged with an operation label.
///
/// Sinks are shared between worker threads and must not block for long.
pub trait MeasurementSink: fmt::Debug + Send + Sync {
    /// Records the latency of one operation in microseconds.
    fn measure(&self, label: &str, micros: u64);

    /// Records the outcome of one operation.
    fn report_status(&self, label: &str, status: &BackendResult<()>) {
        let _ = (label, status);
    }

    /// Records latency and outcome of one operation together.
    fn record(&self, label: &str, micros: u64, status: &BackendResult<()>) {
        self.measure(label, micros);
        self.report_status(label, status);
    }
}

#[derive(Default)]
struct LabelMetrics {
    latency: DDSketch,
    /// Failures by status code.
    failures: BTreeMap<i32, u64>,
}

/// A thread-safe [`MeasurementSink`] aggregating latencies per label.
#[derive(Default)]
pub struct Measurements {
    labels: Mutex<BTreeMap<String, LabelMetrics>>,
}

impl Measurements {
    /// Creates an empty set of measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes all labels recorded so far, ordered by label.
    pub fn snapshot(&self) -> Vec<LabelSummary> {
        let labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        labels
            .iter()
            .map(|(label, metrics)| LabelSummary::new(label, metrics))
            .collect()
    }

    fn with_label(&self, label: &str, f: impl FnOnce(&mut LabelMetrics)) {
        let mut labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        match labels.get_mut(label) {
            Some(metrics) => f(metrics),
            None => f(labels.entry(label.to_owned()).or_default()),
        }
    }
}

impl MeasurementSink for Measurements {
    fn measure(&self, label: &str, micros: u64) {
        self.with_label(label, |metrics| metrics.latency.add(micros as f64));
    }

    fn report_status(&self, label: &str, status: &BackendResult<()>) {
        if status.is_err() {
            let code = status_code(status);
            self.with_label(label, |metrics| *metrics.failures.entry(code).or_default() += 1);
        }
    }

    fn record(&self, label: &str, micros: u64, status: &BackendResult<()>) {
        self.with_label(label, |metrics| {
            metrics.latency.add(micros as f64);
            if status.is_err() {
                *metrics.failures.entry(status_code(status)).or_default() += 1;
            }
        });
    }
}

impl fmt::Debug for Measurements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Measurements")
            .field("labels", &labels.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Latency summary of one operation label. All latencies are in microseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelSummary {
    /// The operation label.
    pub label: String,
    /// Number of recorded latency samples.
    pub count: usize,
    /// Mean latency.
    pub avg: f64,
    /// Median latency.
    pub p50: f64,
    /// 90th percentile latency.
    pub p90: f64,
    /// 99th percentile latency.
    pub p99: f64,
    /// Largest recorded latency.
    pub max: f64,
    /// Failed operations by status code.
    pub failures: BTreeMap<i32, u64>,
}

impl LabelSummary {
    fn new(label: &str, metrics: &LabelMetrics) -> Self {
        let sketch = &metrics.latency;
        let count = sketch.count();
        let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();

        Self {
            label: label.to_owned(),
            count,
            avg: match count {
                0 => 0.0,
                n => sketch.sum().unwrap_or_default() / n as f64,
            },
            p50: quantile(0.5),
            p90: quantile(0.9),
            p99: quantile(0.99),
            max: sketch.max().unwrap_or_default(),
            failures: metrics.failures.clone(),
        }
    }

    /// Total number of failed operations.
    pub fn failed(&self) -> u64 {
        self.failures.values().sum()
    }
}
