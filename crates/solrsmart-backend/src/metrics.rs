use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

pub static SCHEMA_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "schema_cache_lookups_total",
        "Schema cache lookups by result",
        &["result"]
    )
    .unwrap()
});

pub static UPSTREAM_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "upstream_call_seconds",
        "Latency of outbound calls",
        &["call"]
    )
    .unwrap()
});

pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "smart_searches_total",
        "Smart searches by execution path",
        &["path"]
    )
    .unwrap()
});

pub static HYBRID_FALLBACKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hybrid_fallbacks_total",
        "Hybrid searches that fell back to keyword-only"
    )
    .unwrap()
});
