//! Business metrics for check-in.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `checkin.attempts.total{namespace,outcome,reason}` - Verification calls by result
//! - `checkin.errors.total{kind}` - Calls that failed with a timeout or store error
//! - `scan.intake.forwarded.total` - Scan attempts dispatched to the authority
//! - `scan.intake.suppressed.total{reason}` - Scan attempts dropped by the intake gate
//! - `roster.queries.total{kind}` - Roster feed reads
//!
//! ## Histograms
//! - `checkin.duration_seconds{namespace}` - Verification latency

use crate::types::{CheckInResult, Namespace};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register all check-in metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_checkin_metrics() {
    describe_counter!(
        "checkin.attempts.total",
        "Check-in verification calls by namespace, outcome and reason"
    );
    describe_counter!(
        "checkin.errors.total",
        "Check-in calls that failed with a timeout or store error"
    );
    describe_histogram!(
        "checkin.duration_seconds",
        "Time taken to verify one credential"
    );
    describe_counter!(
        "scan.intake.forwarded.total",
        "Scan attempts dispatched by scanning stations"
    );
    describe_counter!(
        "scan.intake.suppressed.total",
        "Scan attempts suppressed by the in-flight gate or the cooldown window"
    );
    describe_counter!("roster.queries.total", "Presence roster reads");
}

/// Record one completed verification.
///
/// `namespace` is `None` for payloads that never parsed.
pub fn record_attempt(namespace: Option<Namespace>, result: &CheckInResult) {
    let namespace = namespace.map_or("UNKNOWN", Namespace::as_str);
    let reason = result.reason().map_or("NONE", |r| r.as_str());

    counter!(
        "checkin.attempts.total",
        "namespace" => namespace,
        "outcome" => result.outcome().as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record verification latency.
pub fn record_duration(namespace: Namespace, elapsed: Duration) {
    histogram!("checkin.duration_seconds", "namespace" => namespace.as_str())
        .record(elapsed.as_secs_f64());
}

/// Record a verification that failed with an error.
pub fn record_error(kind: &'static str) {
    counter!("checkin.errors.total", "kind" => kind).increment(1);
}
