use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ALERTS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "triage_alerts_total",
        "Alerts processed, by triage path.",
        &["path"],
        REGISTRY
    )
    .unwrap();
    pub static ref DIAGNOSIS_FAILURES_TOTAL: IntCounter = register_int_counter_with_registry!(
        "triage_diagnosis_failures_total",
        "Firing alerts skipped because no diagnosis was produced.",
        REGISTRY
    )
    .unwrap();
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "triage_notifications_total",
        "Notification attempts, by result.",
        &["result"],
        REGISTRY
    )
    .unwrap();
}

/// Force registration so every series shows up before the first alert.
pub fn register_metrics() {
    lazy_static::initialize(&ALERTS_TOTAL);
    lazy_static::initialize(&DIAGNOSIS_FAILURES_TOTAL);
    lazy_static::initialize(&NOTIFICATIONS_TOTAL);
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not UTF-8: {}", e)))
}
