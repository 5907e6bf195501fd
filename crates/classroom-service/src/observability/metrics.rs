//! Metrics definitions for the classroom core.
//!
//! All metrics follow Prometheus naming conventions:
//! - `classroom_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label is drawn from a closed set:
//! - `operation`: list, create, start, join
//! - `outcome`: success, error, skipped (and media acquire outcomes)
//! - `state`: the bridge phases
//! - `event`: the six engine event kinds

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle for
/// serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("classroom_directory".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set directory latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("classroom_bridge_connect".to_string()),
            &[0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 15.000, 30.000, 60.000],
        )
        .map_err(|e| format!("Failed to set bridge connect buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session Directory
// ============================================================================

/// Record a session directory call.
///
/// Metrics: `classroom_directory_requests_total`, `classroom_directory_request_duration_seconds`
/// Labels: `operation`, `outcome`
pub fn record_directory_request(operation: &'static str, outcome: &'static str, duration: Duration) {
    counter!(
        "classroom_directory_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "classroom_directory_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Count records dropped because their status was not recognised.
///
/// Metric: `classroom_directory_rejected_records_total`
pub fn record_rejected_record() {
    counter!("classroom_directory_rejected_records_total").increment(1);
}

// ============================================================================
// Discovery Poller
// ============================================================================

/// Record one poll tick.
///
/// Metric: `classroom_poll_total`
/// Labels: `outcome` (success, error, skipped)
pub fn record_poll(outcome: &'static str) {
    counter!("classroom_poll_total", "outcome" => outcome).increment(1);
}

/// Set the size of each discovery list after a successful poll.
///
/// Metric: `classroom_sessions_visible`
/// Labels: `view` (live, upcoming, past)
// usize to f64 is exact for realistic list sizes
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_visible(live: usize, upcoming: usize, past: usize) {
    gauge!("classroom_sessions_visible", "view" => "live").set(live as f64);
    gauge!("classroom_sessions_visible", "view" => "upcoming").set(upcoming as f64);
    gauge!("classroom_sessions_visible", "view" => "past").set(past as f64);
}

// ============================================================================
// Device Preview
// ============================================================================

/// Record a camera/microphone acquisition attempt.
///
/// Metric: `classroom_media_acquire_total`
/// Labels: `outcome` (success, permission_denied, not_found, busy, other)
pub fn record_media_acquire(outcome: &'static str) {
    counter!("classroom_media_acquire_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Meeting Bridge
// ============================================================================

/// Record a bridge state transition.
///
/// Metric: `classroom_bridge_transitions_total`
/// Labels: `state`
pub fn record_bridge_transition(state: &'static str) {
    counter!("classroom_bridge_transitions_total", "state" => state).increment(1);
}

/// Record the time from bridge spawn to "conference joined".
///
/// Metric: `classroom_bridge_connect_duration_seconds`
pub fn record_bridge_connect_duration(duration: Duration) {
    histogram!("classroom_bridge_connect_duration_seconds").record(duration.as_secs_f64());
}

/// Record an engine event relayed (or dropped) by the bridge.
///
/// Metric: `classroom_engine_events_total`
/// Labels: `event`, `outcome` (relayed, dropped)
pub fn record_engine_event(event: &'static str, outcome: &'static str) {
    counter!(
        "classroom_engine_events_total",
        "event" => event,
        "outcome" => outcome
    )
    .increment(1);
}

/// A bridge constructed an engine instance.
///
/// Metric: `classroom_bridges_active` (gauge of bridges holding an engine)
pub fn bridge_engine_created() {
    gauge!("classroom_bridges_active").increment(1.0);
}

/// A bridge disposed its engine instance.
pub fn bridge_engine_disposed() {
    gauge!("classroom_bridges_active").decrement(1.0);
}
