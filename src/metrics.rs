use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramVec, IntGaugeVec, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram_vec, register_int_gauge_vec,
};
use std::time::Duration;
use crate::error::MetricsError;
use crate::models::Verb;

lazy_static! {
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "gateway_requests_total",
        "Total number of dispatched requests",
        &["verb", "route", "status"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        "gateway_request_duration_seconds",
        "Dispatch latency in seconds",
        &["verb", "route", "status"]
    )
    .unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("gateway_cache_size", "Current number of items in cache").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref CIRCUIT_STATE: IntGaugeVec = register_int_gauge_vec!(
        "gateway_circuit_state",
        "Circuit breaker state per service (0 closed, 1 open, 2 half-open)",
        &["service"]
    )
    .unwrap();
}

// One observation per completed request
pub fn observe_request(verb: Verb, route: &str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    let labels = [verb.as_str(), route, status.as_str()];
    REQUEST_TOTAL.with_label_values(&labels).inc();
    REQUEST_LATENCY
        .with_label_values(&labels)
        .observe(elapsed.as_secs_f64());
}

// Prometheus text exposition of the default registry
pub fn render() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
