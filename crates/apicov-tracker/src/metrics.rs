use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

pub static OBSERVATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("apicov_observations_total", "Total recorded HTTP observations")
        .expect("valid metric definition")
});
pub static TRANSPORT_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "apicov_transport_failures_total",
        "Intercepted calls that ended in a transport error",
    )
    .expect("valid metric definition")
});
pub static CANCELLED_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "apicov_cancelled_requests_total",
        "Intercepted calls dropped before completion",
    )
    .expect("valid metric definition")
});
pub static REQUEST_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "apicov_request_latency_seconds",
        "Latency of intercepted calls",
    ))
    .expect("valid metric definition")
});

/// Register the tracker metrics; already-registered collectors are ignored.
pub fn register(reg: &Registry) {
    reg.register(Box::new(OBSERVATIONS_TOTAL.clone())).ok();
    reg.register(Box::new(TRANSPORT_FAILURES_TOTAL.clone())).ok();
    reg.register(Box::new(CANCELLED_REQUESTS_TOTAL.clone())).ok();
    reg.register(Box::new(REQUEST_LATENCY.clone())).ok();
}
