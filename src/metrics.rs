use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("relay_requests_total", "Total number of deploy endpoint requests").unwrap();
    pub static ref QUOTA_PROBES: Counter =
        register_counter!("relay_quota_probes_total", "Total quota-check probes").unwrap();
    pub static ref DEPLOYS_SUCCEEDED: Counter =
        register_counter!("relay_deploys_succeeded_total", "Total successful deploys").unwrap();
    pub static ref DEPLOYS_REJECTED: CounterVec = register_counter_vec!(
        "relay_deploys_rejected_total",
        "Total rejected deploy requests by reason",
        &["reason"]
    )
    .unwrap();
    pub static ref PROVIDER_LATENCY: Histogram = register_histogram!(
        "relay_provider_latency_seconds",
        "Deployment provider call latency in seconds"
    )
    .unwrap();
    pub static ref LEDGER_SIZE: Gauge =
        register_gauge!("relay_ledger_size", "Current number of client quota records").unwrap();
}
