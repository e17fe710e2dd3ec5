use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref UPSTREAM_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_upstream_requests_total",
        "Total requests sent to upstream services"
    ))
    .unwrap();
    pub static ref UPSTREAM_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_upstream_failures_total",
        "Total upstream requests that failed or returned an error status"
    ))
    .unwrap();
    pub static ref UPSTREAM_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dashboard_upstream_latency_seconds",
            "Time taken for a single upstream request"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ])
    )
    .unwrap();
    pub static ref STATISTICS_TIMEOUTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_statistics_timeouts_total",
        "Total statistics aggregations that hit their deadline"
    ))
    .unwrap();
    pub static ref HTTP_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_http_requests_total",
        "Total inbound HTTP requests served"
    ))
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dashboard_http_request_duration_seconds",
            "Time taken to serve an inbound HTTP request"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(UPSTREAM_REQUESTS_TOTAL.clone()),
        Box::new(UPSTREAM_FAILURES_TOTAL.clone()),
        Box::new(UPSTREAM_LATENCY_SECONDS.clone()),
        Box::new(STATISTICS_TIMEOUTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        // Registering twice happens when several routers are built in one process.
        if let Err(e) = REGISTRY.register(collector) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                error!("Failed to register metric: {}", e);
            }
        }
    }
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_init() {
        init_metrics();
        init_metrics();
        UPSTREAM_REQUESTS_TOTAL.inc();

        let text = gather_metrics();
        assert!(text.contains("dashboard_upstream_requests_total"));
    }
}
