//! Presence roster endpoints.
//!
//! Read-only, safe to poll from any number of dashboards:
//! - GET /api/roster/recent?limit=&namespace= - Recently checked-in participants
//! - GET /api/roster/summary - Registered and present counts per namespace

use crate::roster::AttendanceSummary;
use crate::server::state::AppState;
use crate::store::StoreError;
use crate::types::{Namespace, ParticipantSnapshot};
use axum::{
    Json,
    extract::{Query, State},
};
use gatecheck_web::AppError;
use serde::Deserialize;

/// Query parameters of `GET /api/roster/recent`
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    /// Page size; clamped by the server
    pub limit: Option<usize>,
    /// `GENERAL` or `SPH` / `WORKSHOP`
    pub namespace: Option<String>,
}

fn store_failure(error: StoreError) -> AppError {
    AppError::unavailable("Roster temporarily unavailable.").with_source(anyhow::Error::new(error))
}

/// Participants checked in, most recent first.
///
/// # Example
///
/// ```bash
/// curl 'http://localhost:8080/api/roster/recent?limit=10&namespace=SPH'
/// ```
///
/// # Errors
///
/// Returns `422` for an unknown namespace and `503` when the store is down.
pub async fn recently_present(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ParticipantSnapshot>>, AppError> {
    let namespace = query
        .namespace
        .as_deref()
        .map(str::parse::<Namespace>)
        .transpose()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let roster = state
        .service
        .recently_present(query.limit, namespace)
        .await
        .map_err(store_failure)?;

    Ok(Json(roster))
}

/// Registered and present counts.
///
/// # Errors
///
/// Returns `503` when the store is down.
pub async fn attendance_summary(
    State(state): State<AppState>,
) -> Result<Json<AttendanceSummary>, AppError> {
    let summary = state
        .service
        .attendance_summary()
        .await
        .map_err(store_failure)?;
    Ok(Json(summary))
}
