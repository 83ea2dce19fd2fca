//! Counters/gauges/histograms for the audit & metrics layer (spec §4.7),
//! built on the `metrics` facade the way `other_examples/manifests` show it
//! used elsewhere in the retrieval pack — this core never picks a concrete
//! exporter, it only records against whatever recorder the host installs.

use std::time::Duration;

pub fn record_enrollment(realm: &str, outcome: &'static str) {
    metrics::counter!("biometric_enrollment_total", "realm" => realm.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_verification(realm: &str, outcome: &'static str, duration: Duration) {
    metrics::counter!("biometric_verification_total", "realm" => realm.to_string(), "outcome" => outcome).increment(1);
    metrics::histogram!("biometric_verification_duration_seconds", "realm" => realm.to_string()).record(duration.as_secs_f64());
}

pub fn record_liveness(realm: &str, mode: &'static str, outcome: &'static str) {
    metrics::counter!("biometric_liveness_total", "realm" => realm.to_string(), "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn record_rpc_call(operation: &'static str, outcome: &'static str, duration: Duration) {
    metrics::counter!("bws_rpc_calls_total", "operation" => operation, "outcome" => outcome).increment(1);
    metrics::histogram!("bws_rpc_duration_seconds", "operation" => operation).record(duration.as_secs_f64());
}

pub fn set_circuit_state(operation: &'static str, open: bool) {
    metrics::gauge!("bws_circuit_open", "operation" => operation).set(if open { 1.0 } else { 0.0 });
}

pub fn set_bulk_progress(realm: &str, operation_id: &str, processed: u64, total: u64) {
    metrics::gauge!(
        "bulk_operation_progress_ratio",
        "realm" => realm.to_string(),
        "operation_id" => operation_id.to_string()
    )
    .set(if total == 0 { 0.0 } else { processed as f64 / total as f64 });
}

pub fn record_bulk_operation(realm: &str, event: &'static str) {
    metrics::counter!("bulk_operation_total", "realm" => realm.to_string(), "event" => event).increment(1);
}

pub fn record_deletion_request(realm: &str, event: &'static str) {
    metrics::counter!("deletion_request_total", "realm" => realm.to_string(), "event" => event).increment(1);
}

/// Reports the configured channel-pool capacity per region (spec §4.1.1,
/// §4.7 `channel_pool_{active,idle}`). `HttpBwsTransport` delegates actual
/// connection pooling to `reqwest`, so this records the configured budget
/// rather than a live per-channel count.
pub fn set_channel_pool_state(idle: u64) {
    metrics::gauge!("channel_pool_idle").set(idle as f64);
}
