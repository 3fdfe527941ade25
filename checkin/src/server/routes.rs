//! Router configuration for the check-in service.

use super::health::readiness_check;
use super::state::AppState;
use crate::api::{checkin, roster};
use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use gatecheck_web::correlation_id_layer;
use gatecheck_web::handlers::health_check;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// - `GET /health` - liveness
/// - `GET /ready` - readiness (participant store ping)
/// - `POST /api/checkin` - verify a scanned payload
/// - `GET /api/roster/recent` - recently checked-in participants
/// - `GET /api/roster/summary` - attendance counts
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/checkin", post(checkin::submit_check_in))
        .route("/roster/recent", get(roster::recently_present))
        .route("/roster/summary", get(roster::attendance_summary));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}

/// Router serving `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move {
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                    handle.render(),
                )
                    .into_response()
            }
        }),
    )
}
