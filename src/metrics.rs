//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Snapshot cache
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_cache_hits_total", "Total number of snapshot cache hits"),
        &["dataset"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_cache_misses_total", "Total number of snapshot cache misses"),
        &["dataset"]
    ).expect("metric can be created");
    pub static ref VALIDATION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_validation_failures_total", "Cached payloads rejected by the validator"),
        &["dataset"]
    ).expect("metric can be created");
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_store_errors_total", "Key/value store operations that failed"),
        &["operation"]
    ).expect("metric can be created");
    pub static ref DATASET_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("coolfollowers_dataset_size", "Number of entries in the last committed snapshot"),
        &["dataset"]
    ).expect("metric can be created");

    // Refresh coordination
    pub static ref REFRESH_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_refresh_requests_total", "Refresh requests by decision"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref REFRESH_COMPLETIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_refresh_completions_total", "Terminal refresh transitions"),
        &["status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("coolfollowers_errors_total", "Total number of errors"),
        &["error_type"]
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
        .register(Box::new(VALIDATION_FAILURES_TOTAL.clone()))
        .expect("VALIDATION_FAILURES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_ERRORS_TOTAL.clone()))
        .expect("STORE_ERRORS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DATASET_SIZE.clone()))
        .expect("DATASET_SIZE can be registered");
    REGISTRY
        .register(Box::new(REFRESH_REQUESTS_TOTAL.clone()))
        .expect("REFRESH_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(REFRESH_COMPLETIONS_TOTAL.clone()))
        .expect("REFRESH_COMPLETIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
