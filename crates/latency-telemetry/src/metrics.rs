//! Prometheus metrics for the latency harness.
//!
//! All metrics follow the naming convention: `latency_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Probes handed to a transport
    pub static ref PROBES_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("latency_probes_sent_total", "Probes dispatched to a transport"),
        &["transport"]
    ).expect("metric creation failed");

    /// Responses matched to a pending probe
    pub static ref RESPONSES_MATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("latency_responses_matched_total", "Responses correlated to a pending probe"),
        &["transport"]
    ).expect("metric creation failed");

    /// Responses whose token had no pending entry
    pub static ref ORPHAN_RESPONSES: IntCounterVec = IntCounterVec::new(
        Opts::new("latency_orphan_responses_total", "Responses with no matching pending probe"),
        &["transport"]
    ).expect("metric creation failed");

    /// Recovered harness errors by kind
    pub static ref HARNESS_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("latency_harness_errors_total", "Harness errors by kind"),
        &["kind"]
    ).expect("metric creation failed");

    /// Round-trip time distribution (0.05 ms .. ~1.6 s)
    pub static ref ROUND_TRIP_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("latency_round_trip_ms", "Measured round-trip time in milliseconds")
            .buckets(exponential_buckets(0.05, 2.0, 16).expect("bucket layout is static")),
        &["transport"]
    ).expect("metric creation failed");
}

/// Handle proving the collectors are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Idempotent: collectors already registered are left as they are.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PROBES_SENT.clone()),
        Box::new(RESPONSES_MATCHED.clone()),
        Box::new(ORPHAN_RESPONSES.clone()),
        Box::new(HARNESS_ERRORS.clone()),
        Box::new(ROUND_TRIP_MS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Count a dispatched probe.
pub fn record_probe_sent(transport: &str) {
    PROBES_SENT.with_label_values(&[transport]).inc();
}

/// Count a matched response and observe its round trip.
pub fn record_round_trip(transport: &str, elapsed_ms: f64) {
    RESPONSES_MATCHED.with_label_values(&[transport]).inc();
    ROUND_TRIP_MS
        .with_label_values(&[transport])
        .observe(elapsed_ms.max(0.0));
}

/// Count an orphan response.
pub fn record_orphan(transport: &str) {
    ORPHAN_RESPONSES.with_label_values(&[transport]).inc();
}

/// Count a recovered error.
pub fn record_error(kind: &str) {
    HARNESS_ERRORS.with_label_values(&[kind]).inc();
}
