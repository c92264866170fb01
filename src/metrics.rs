//! Prometheus metrics registry and instruments.
//!
//! Instruments are usable before [`init_metrics`] runs; registration only
//! makes them visible through [`REGISTRY`].

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_cache_hits_total", "Total number of record cache hits"),
        &["table"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_cache_misses_total", "Total number of record cache misses"),
        &["table"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGauge = IntGauge::new(
        "rollbook_cache_size",
        "Current number of table snapshots in cache"
    ).expect("metric can be created");

    // Store Metrics
    pub static ref STORE_MODE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("rollbook_store_mode", "Active backing store (1 = active)"),
        &["mode"]
    ).expect("metric can be created");
    pub static ref REMOTE_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_remote_attempts_total", "Remote store attempts by operation and outcome"),
        &["operation", "outcome"]
    ).expect("metric can be created");
    pub static ref WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_writes_total", "Full-replace writes by remote outcome"),
        &["table", "remote"]
    ).expect("metric can be created");
    pub static ref SYNC_TABLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_sync_tables_total", "Login-time table pulls by status"),
        &["table", "status"]
    ).expect("metric can be created");
    pub static ref SYNC_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "rollbook_sync_duration_seconds",
            "Login-time sync duration in seconds"
        ).buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rollbook_errors_total", "Total number of errors"),
        &["kind"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_SIZE.clone()))
        .expect("CACHE_SIZE can be registered");
    REGISTRY
        .register(Box::new(STORE_MODE.clone()))
        .expect("STORE_MODE can be registered");
    REGISTRY
        .register(Box::new(REMOTE_ATTEMPTS_TOTAL.clone()))
        .expect("REMOTE_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(WRITES_TOTAL.clone()))
        .expect("WRITES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SYNC_TABLES_TOTAL.clone()))
        .expect("SYNC_TABLES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SYNC_DURATION_SECONDS.clone()))
        .expect("SYNC_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

pub fn observe_sync(status: &str, elapsed: Duration) {
    SYNC_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_remote_attempt(operation: &str, outcome: &str) {
    REMOTE_ATTEMPTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Render the registry in the Prometheus text exposition format.
pub fn render() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(%error, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
