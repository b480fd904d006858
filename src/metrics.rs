use anyhow::Result;
use prometheus::{
    Encoder, TextEncoder, IntCounterVec, HistogramVec,
    register_int_counter_vec, register_histogram_vec,
};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coredns_mysql_store_operations_total",
        "Counter of record store operations by outcome.",
        &["operation", "result"]
    ).unwrap();

    pub static ref STORE_RECORDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coredns_mysql_store_records_total",
        "Counter of records returned by record store operations, including partial results.",
        &["operation"]
    ).unwrap();

    pub static ref STORE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "coredns_mysql_store_operation_duration_seconds",
        "Histogram of the time (in seconds) each record store operation took.",
        &["operation"],
        vec![0.00025, 0.0005, 0.001, 0.002, 0.004, 0.008, 0.016, 0.032, 0.064, 0.128, 0.256, 0.512, 1.024, 2.048, 4.096, 8.192]
    ).unwrap();

    pub static ref POOL_CONSTRUCTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coredns_mysql_store_pool_constructions_total",
        "Counter of connection pool construction attempts by outcome.",
        &["result"]
    ).unwrap();
}

/// Outcome label for an operation result.
pub fn result_label(error: Option<&crate::error::StoreError>) -> &'static str {
    use crate::error::StoreError;
    match error {
        None => "success",
        Some(StoreError::Connection(_)) | Some(StoreError::MissingInsertId) => "database_error",
        Some(StoreError::UnsupportedType(_)) => "unsupported_type",
        Some(StoreError::InvalidValue(_)) => "invalid_value",
        Some(StoreError::InvalidId(_)) => "invalid_id",
        Some(StoreError::NotImplemented(_)) => "not_implemented",
        Some(StoreError::MalformedPayload(_)) => "malformed_payload",
        Some(StoreError::Cancelled) | Some(StoreError::DeadlineExceeded) => "cancelled",
        Some(StoreError::Config(_)) => "config_error",
    }
}

/// Text exposition of every registered metric.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn labels_group_errors() {
        assert_eq!(result_label(None), "success");
        assert_eq!(result_label(Some(&StoreError::InvalidId("x".into()))), "invalid_id");
        assert_eq!(result_label(Some(&StoreError::DeadlineExceeded)), "cancelled");
    }

    #[test]
    fn render_includes_store_metrics() {
        STORE_OPERATIONS_TOTAL.with_label_values(&["list", "success"]).inc();
        let text = render().unwrap();
        assert!(text.contains("coredns_mysql_store_operations_total"));
    }
}
