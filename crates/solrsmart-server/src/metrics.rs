use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec, Encoder, TextEncoder};

pub static HTTP_RESPONSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_responses_total",
        "Responses by route and status class",
        &["route", "status"]
    )
    .unwrap()
});

pub fn record(route: &str, status: axum::http::StatusCode) {
    let class = match status.as_u16() {
        200..=299 => "2xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    HTTP_RESPONSES_TOTAL.with_label_values(&[route, class]).inc();
}

/// Default registry in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let _ = encoder.encode(&metric_families, &mut buf);
    String::from_utf8(buf).unwrap_or_default()
}
