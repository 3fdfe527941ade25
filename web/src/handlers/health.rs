//! Liveness and readiness endpoints.
//!
//! `/health` only proves the process answers. Readiness aggregates the
//! component checks an application gathers (databases, runtime stores) and
//! reports `503` as soon as one of them is unhealthy.

use axum::{Json, http::StatusCode};
use gatecheck_runtime::{HealthCheck, HealthStatus};
use serde::Serialize;

/// Liveness response body.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version of the serving binary
    pub version: &'static str,
}

/// Liveness endpoint.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<LivenessResponse>) {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Aggregated readiness report.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    /// Worst status among the components
    pub status: HealthStatus,
    /// Individual component checks
    pub checks: Vec<HealthCheck>,
}

impl ReadinessReport {
    /// Combine component checks; no checks means healthy.
    #[must_use]
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));
        Self { status, checks }
    }
}

/// Turn component checks into a readiness response.
///
/// - 200 OK: every component healthy
/// - 503 Service Unavailable: any component Unhealthy
#[must_use]
pub fn readiness_response(checks: Vec<HealthCheck>) -> (StatusCode, Json<ReadinessReport>) {
    let report = ReadinessReport::from_checks(checks);

    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => {
            tracing::warn!(checks = ?report.checks, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        },
    };

    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[test]
    fn healthy_components_are_ready() {
        let (status, Json(report)) = readiness_response(vec![
            HealthCheck::healthy("store"),
            HealthCheck::healthy("participant_store").with_metadata("backend", "memory"),
        ]);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.checks.len(), 2);
    }

    #[test]
    fn unhealthy_component_fails_readiness() {
        let (status, Json(report)) = readiness_response(vec![
            HealthCheck::healthy("store"),
            HealthCheck::unhealthy("participant_store", "connection refused"),
        ]);

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn no_checks_means_healthy() {
        assert_eq!(
            ReadinessReport::from_checks(Vec::new()).status,
            HealthStatus::Healthy
        );
    }
}
