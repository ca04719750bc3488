use std::time::Duration;

/// Records `weft.query.duration_ms` and `weft.query.count` for one statement.
#[cfg(feature = "metrics")]
pub(crate) fn record_query_metrics(operation: &'static str, table: &str, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let labels = [
        ("operation", operation.to_string()),
        ("table", table.to_string()),
    ];
    metrics::histogram!("weft.query.duration_ms", &labels).record(elapsed_ms);
    metrics::counter!("weft.query.count", &labels).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_query_metrics(_operation: &'static str, _table: &str, _elapsed: Duration) {}
