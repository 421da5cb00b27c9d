//! Metrics sink port.
//!
//! Metric names and their label sets are an external contract; emitters
//! use the constants below rather than ad-hoc strings.

/// Label pairs attached to a metric observation.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Trait for label-keyed counters, gauges, and histograms.
///
/// Methods are synchronous so emitters can record from any context;
/// implementations use interior mutability.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by `by`.
    fn incr_counter(&self, name: &str, labels: Labels<'_>, by: u64);

    /// Set a gauge to `value`.
    fn set_gauge(&self, name: &str, labels: Labels<'_>, value: f64);

    /// Record one histogram observation.
    fn observe(&self, name: &str, labels: Labels<'_>, value: f64);
}

/// Sink that drops every observation; used when metrics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn incr_counter(&self, _name: &str, _labels: Labels<'_>, _by: u64) {}
    fn set_gauge(&self, _name: &str, _labels: Labels<'_>, _value: f64) {}
    fn observe(&self, _name: &str, _labels: Labels<'_>, _value: f64) {}
}

/// Contract metric names.
pub mod names {
    // Counters
    pub const RETRY_ATTEMPTS_TOTAL: &str = "retry_attempts_total";
    pub const RETRY_TEMPERATURE_CHANGES: &str = "retry_temperature_changes";
    pub const ATOMS_SUCCEEDED_TOTAL: &str = "atoms_succeeded_total";
    pub const ATOMS_FAILED_TOTAL: &str = "atoms_failed_total";

    // Gauges
    pub const RETRY_SUCCESS_RATE: &str = "retry_success_rate";
    pub const WAVE_COMPLETION_PERCENT: &str = "wave_completion_percent";
    pub const EXECUTION_PRECISION_PERCENT: &str = "execution_precision_percent";
    pub const EXECUTION_COST_USD_TOTAL: &str = "execution_cost_usd_total";
    pub const ATOM_VALIDATION_PASS_RATE: &str = "atom_validation_pass_rate";

    // Histograms
    pub const WAVE_ATOM_THROUGHPUT: &str = "wave_atom_throughput";
    pub const WAVE_TIME_SECONDS: &str = "wave_time_seconds";
    pub const EXECUTION_TIME_SECONDS: &str = "execution_time_seconds";
    pub const ATOM_EXECUTION_TIME_SECONDS: &str = "atom_execution_time_seconds";
}
