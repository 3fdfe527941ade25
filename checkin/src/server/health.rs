//! Readiness endpoint.
//!
//! Liveness (`/health`) comes from `gatecheck_web`; readiness additionally
//! pings the participant store.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use gatecheck_web::handlers::{ReadinessReport, readiness_response};

/// Readiness check endpoint.
///
/// Returns 503 while the participant store cannot be reached, so load
/// balancers stop routing scans to this instance.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"healthy","checks":[{"component":"participant_store","status":"healthy",...}]}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    readiness_response(vec![state.service.store_health().await])
}
