//! Prometheus metrics for garage-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Document store operation duration by operation.
pub static STORE_OP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "garage_store_op_duration_seconds",
        "Document store operation duration in seconds",
        &["operation"], // get, list, query, commit, modify
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register store_op_duration")
});

/// Fan-out batches by entity, lifecycle event and outcome.
pub static FANOUT_BATCHES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "garage_fanout_batches_total",
        "Total number of fan-out batches",
        &["entity", "event", "outcome"]
    )
    .expect("Failed to register fanout_batches_total")
});

/// Snapshot cache lookups by namespace and result.
pub static CACHE_LOOKUPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "garage_cache_lookups_total",
        "Total number of snapshot cache lookups",
        &["namespace", "result"] // hit, miss
    )
    .expect("Failed to register cache_lookups_total")
});

/// Items processed by migration and recalculation routines.
pub static MIGRATION_ITEMS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "garage_migration_items_total",
        "Total number of items processed by migrations",
        &["routine", "outcome"] // success, skipped, failed
    )
    .expect("Failed to register migration_items_total")
});

/// Invoiced amount by invoice type.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "garage_invoice_amount_total",
        "Total invoiced amount by invoice type",
        &["invoice_type"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "garage_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&STORE_OP_DURATION);
    Lazy::force(&FANOUT_BATCHES_TOTAL);
    Lazy::force(&CACHE_LOOKUPS_TOTAL);
    Lazy::force(&MIGRATION_ITEMS_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
}

/// Count an error by its `AppError` kind.
pub fn record_error(error: &service_core::error::AppError) {
    ERRORS_TOTAL.with_label_values(&[error.kind()]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
