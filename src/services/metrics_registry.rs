//! In-memory metrics registry.
//!
//! A [`MetricsSink`] implementation that accumulates label-keyed
//! counters, gauges, and histogram summaries in process memory, with
//! query accessors for tests and CLI summaries. An exporter-backed sink
//! is a drop-in replacement for the same port.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::domain::ports::metrics::{Labels, MetricsSink};

/// Metric identity: name plus its sorted label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    name: String,
    labels: BTreeMap<String, String>,
}

impl MetricKey {
    fn new(name: &str, labels: Labels<'_>) -> Self {
        Self {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

/// Running summary of one histogram series.
#[derive(Debug, Clone, Copy)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

impl Default for HistogramSummary {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

/// Metrics sink backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    counters: RwLock<HashMap<MetricKey, u64>>,
    gauges: RwLock<HashMap<MetricKey, f64>>,
    histograms: RwLock<HashMap<MetricKey, HistogramSummary>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter value for an exact label set; zero when never incremented.
    pub fn counter(&self, name: &str, labels: Labels<'_>) -> u64 {
        self.counters
            .read()
            .map(|map| map.get(&MetricKey::new(name, labels)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Sum of a counter across every label set.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.counters
            .read()
            .map(|map| {
                map.iter()
                    .filter(|(key, _)| key.name == name)
                    .map(|(_, value)| *value)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Latest gauge value for an exact label set.
    pub fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        self.gauges
            .read()
            .ok()
            .and_then(|map| map.get(&MetricKey::new(name, labels)).copied())
    }

    /// Histogram summary for an exact label set.
    pub fn histogram(&self, name: &str, labels: Labels<'_>) -> Option<HistogramSummary> {
        self.histograms
            .read()
            .ok()
            .and_then(|map| map.get(&MetricKey::new(name, labels)).copied())
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn incr_counter(&self, name: &str, labels: Labels<'_>, by: u64) {
        if let Ok(mut map) = self.counters.write() {
            *map.entry(MetricKey::new(name, labels)).or_insert(0) += by;
        }
    }

    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64) {
        if let Ok(mut map) = self.gauges.write() {
            map.insert(MetricKey::new(name, labels), value);
        }
    }

    fn observe(&self, name: &str, labels: Labels<'_>, value: f64) {
        if let Ok(mut map) = self.histograms.write() {
            map.entry(MetricKey::new(name, labels))
                .or_default()
                .observe(value);
        }
    }
}
