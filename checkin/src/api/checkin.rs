//! Check-in endpoint.
//!
//! - POST /api/checkin - Verify a scanned payload and record attendance
//!
//! Expected failures (unknown ticket, payment pending, already present, ...)
//! are `200 OK` with `outcome = "FAILURE"`. Only timeouts and store outages
//! are HTTP errors, and both are marked retryable.

use crate::authority::CheckInError;
use crate::server::state::AppState;
use crate::types::{CheckInOutcome, CheckInResult, DeviceId, ParticipantSnapshot, ReasonCode};
use axum::{Extension, Json, extract::State};
use gatecheck_web::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of `POST /api/checkin`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    /// Raw scanner payload, e.g. `GENERAL|ABC123`
    #[serde(default)]
    pub payload: String,
    /// Scanning station identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Response of `POST /api/checkin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInResponse {
    /// `SUCCESS` or `FAILURE`
    pub outcome: CheckInOutcome,
    /// Failure reason code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    /// Operator-facing message
    pub message: String,
    /// Checked-in participant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantSnapshot>,
}

impl From<CheckInResult> for CheckInResponse {
    fn from(result: CheckInResult) -> Self {
        let outcome = result.outcome();
        let message = result.message();
        match result {
            CheckInResult::Success { participant } => Self {
                outcome,
                reason: None,
                message,
                participant: Some(participant),
            },
            CheckInResult::Failure { reason } => Self {
                outcome,
                reason: Some(reason),
                message,
                participant: None,
            },
        }
    }
}

impl CheckInResponse {
    /// Rebuild the result on the client side.
    ///
    /// Returns `None` if the body is missing the field its outcome requires.
    #[must_use]
    pub fn into_result(self) -> Option<CheckInResult> {
        match (self.outcome, self.reason, self.participant) {
            (CheckInOutcome::Success, _, Some(participant)) => {
                Some(CheckInResult::Success { participant })
            },
            (CheckInOutcome::Failure, Some(reason), _) => Some(CheckInResult::failure(reason)),
            _ => None,
        }
    }
}

impl From<CheckInError> for AppError {
    fn from(error: CheckInError) -> Self {
        match error {
            CheckInError::Timeout { .. } => {
                Self::timeout("Check-in timed out. It is safe to scan again.")
            },
            CheckInError::Store(_) => {
                Self::unavailable("Check-in service temporarily unavailable. Scan again.")
            },
        }
        .with_source(anyhow::Error::new(error))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Verify a scanned payload.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/checkin \
///   -H "Content-Type: application/json" \
///   -d '{"payload": "GENERAL|ABC123", "device_id": "gate-a"}'
/// ```
///
/// Response:
/// ```json
/// {
///   "outcome": "SUCCESS",
///   "message": "Welcome, Ana Lima (Lisbon).",
///   "participant": { "id": "...", "namespace": "GENERAL", ... }
/// }
/// ```
///
/// # Errors
///
/// Returns `408` when the store times out and `503` when it is unavailable.
pub async fn submit_check_in(
    State(state): State<AppState>,
    correlation_id: Option<Extension<Uuid>>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, AppError> {
    let device = DeviceId::new(request.device_id.as_deref().unwrap_or_default());
    tracing::debug!(
        correlation_id = ?correlation_id.map(|Extension(id)| id),
        %device,
        "Check-in request"
    );

    let result = state.service.submit_scan(&request.payload, &device).await?;
    Ok(Json(result.into()))
}
