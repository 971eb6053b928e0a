use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static STORAGE_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "notes_storage_operations_total",
        "Storage operations by backend, operation and outcome",
        &["backend", "op", "outcome"]
    )
    .expect("register storage_operations_total")
});

pub static STORAGE_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "notes_storage_operation_duration_seconds",
        "Storage operation duration in seconds",
        &["backend", "op"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("register storage_operation_duration")
});

/// Text exposition of the default registry.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_series_show_up_in_exposition() {
        STORAGE_OPERATIONS_TOTAL.with_label_values(&["memory", "get", "ok"]).inc();
        STORAGE_OPERATION_DURATION.with_label_values(&["memory", "get"]).observe(0.002);
        let text = encode_metrics().unwrap();
        assert!(text.contains("notes_storage_operations_total"));
        assert!(text.contains("notes_storage_operation_duration_seconds_bucket"));
    }
}
