use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec, IntCounterVec,
    IntGauge, TextEncoder,
};
use tracing::warn;

pub static WORKER_INSTRUMENTATION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "worker_instrumentation_active",
        "Set to 1 once process instrumentation has been installed"
    )
    .expect("register worker_instrumentation_active")
});

pub static WORKER_INSTRUMENTATION_ACTIVATED_TIMESTAMP_SECONDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "worker_instrumentation_activated_timestamp_seconds",
        "Unix time at which instrumentation was installed"
    )
    .expect("register worker_instrumentation_activated_timestamp_seconds")
});

pub static WORKER_LISTENING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "worker_listening",
        "Set to 1 while the HTTP listener is bound and serving"
    )
    .expect("register worker_listening")
});

pub static WORKER_HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "worker_http_requests_total",
        "Total number of HTTP requests handled by the worker",
        &["method", "path", "status"]
    )
    .expect("register worker_http_requests_total")
});

pub static WORKER_HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "worker_http_request_duration_seconds",
        "Histogram of HTTP request handling latency",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("register worker_http_request_duration_seconds")
});

pub fn register() {
    Lazy::force(&WORKER_INSTRUMENTATION_ACTIVE);
    Lazy::force(&WORKER_INSTRUMENTATION_ACTIVATED_TIMESTAMP_SECONDS);
    Lazy::force(&WORKER_LISTENING);
    Lazy::force(&WORKER_HTTP_REQUESTS_TOTAL);
    Lazy::force(&WORKER_HTTP_REQUEST_DURATION_SECONDS);
}

pub fn gather_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        warn!(error = %err, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
