//! Check-in authority.
//!
//! Turns a parsed credential into an attendance decision:
//!
//! 1. Look up the participant. Unknown tokens fail with the namespace's
//!    not-found reason.
//! 2. Workshop participants must have paid.
//! 3. Apply the store's conditional write (`NOT_ARRIVED -> PRESENT`).
//! 4. A write that did not apply is explained from the row the store returned.
//!
//! Every expected outcome is a [`CheckInResult`]. Only infrastructure trouble
//! (timeouts, an unavailable store) is an error, and both are safe to retry
//! because the write is idempotent.

use crate::credential::Credential;
use crate::metrics;
use crate::store::{AttendanceTransition, ParticipantStore, StoreError};
use crate::types::{CheckInResult, Participant, ReasonCode};
use gatecheck_core::environment::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default upper bound for one store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Failures that are not check-in outcomes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckInError {
    /// The store did not answer in time
    #[error("participant store did not answer within {elapsed:?}")]
    Timeout {
        /// The bound that was exceeded
        elapsed: Duration,
    },

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckInError {
    /// Whether the caller may repeat the call.
    ///
    /// Always true: the attendance write applies at most once.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        true
    }

    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Store(_) => "store",
        }
    }
}

/// The attendance state-transition engine.
#[derive(Clone)]
pub struct CheckInAuthority {
    store: Arc<dyn ParticipantStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl CheckInAuthority {
    /// Create an authority over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ParticipantStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Bound every store call by `timeout`.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// The store this authority writes to
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ParticipantStore> {
        &self.store
    }

    /// Verify a credential and record attendance.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError::Timeout`] if a store call exceeds the timeout and
    /// [`CheckInError::Store`] if the store fails.
    #[tracing::instrument(
        skip(self, credential),
        fields(namespace = %credential.namespace(), token = %credential.token())
    )]
    pub async fn check_in(&self, credential: &Credential) -> Result<CheckInResult, CheckInError> {
        let started = Instant::now();
        let result = self.evaluate(credential).await;
        metrics::record_duration(credential.namespace(), started.elapsed());

        match &result {
            Ok(outcome @ CheckInResult::Success { participant }) => {
                metrics::record_attempt(Some(credential.namespace()), outcome);
                tracing::info!(participant = %participant.id, "Participant checked in");
            },
            Ok(outcome @ CheckInResult::Failure { reason }) => {
                metrics::record_attempt(Some(credential.namespace()), outcome);
                tracing::info!(%reason, "Check-in refused");
            },
            Err(error) => {
                metrics::record_error(error.kind());
                tracing::warn!(%error, "Check-in failed");
            },
        }

        result
    }

    async fn evaluate(&self, credential: &Credential) -> Result<CheckInResult, CheckInError> {
        let Some(participant) = self.bounded(self.store.find(credential)).await? else {
            return Ok(CheckInResult::failure(
                credential.namespace().not_found_reason(),
            ));
        };

        if let Some(reason) = participant.payment_gate() {
            return Ok(CheckInResult::failure(reason));
        }

        let now = self.clock.now();
        match self.bounded(self.store.mark_present(credential, now)).await? {
            AttendanceTransition::Transitioned(updated) => Ok(CheckInResult::Success {
                participant: updated.snapshot(),
            }),
            AttendanceTransition::Unchanged(current) => Self::explain_unchanged(&current),
            // Deleted between lookup and write
            AttendanceTransition::Missing => Ok(CheckInResult::failure(
                credential.namespace().not_found_reason(),
            )),
        }
    }

    fn explain_unchanged(current: &Participant) -> Result<CheckInResult, CheckInError> {
        if current.is_present() {
            return Ok(CheckInResult::failure(ReasonCode::AlreadyPresent));
        }
        if let Some(reason) = current.payment_gate() {
            return Ok(CheckInResult::failure(reason));
        }
        Err(StoreError::Inconsistent(format!(
            "conditional write for participant {} did not apply although it is eligible",
            current.id
        ))
        .into())
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, CheckInError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .map_err(|_| CheckInError::Timeout {
                elapsed: self.store_timeout,
            })?
            .map_err(CheckInError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credential::parse;
    use crate::store::InMemoryParticipantStore;
    use crate::types::{AttendanceStatus, PaymentStatus};
    use gatecheck_testing::test_clock;

    async fn authority() -> (CheckInAuthority, InMemoryParticipantStore) {
        let store = InMemoryParticipantStore::with_participants([
            Participant::general("ABC123", "Ana Lima", "Lisbon"),
            Participant::workshop("XYZ9", "Bo Chen", "Porto", PaymentStatus::Pending),
            Participant::workshop("GONE", "Cy Dutra", "Braga", PaymentStatus::Cancelled),
        ])
        .await
        .unwrap();
        let authority = CheckInAuthority::new(Arc::new(store.clone()), Arc::new(test_clock()));
        (authority, store)
    }

    #[tokio::test]
    async fn success_carries_the_snapshot() {
        let (authority, _) = authority().await;

        let result = authority
            .check_in(&parse("GENERAL|ABC123").unwrap())
            .await
            .unwrap();

        let CheckInResult::Success { participant } = result else {
            unreachable!("expected success, got {result:?}");
        };
        assert_eq!(participant.display_name, "Ana Lima");
        assert_eq!(participant.checked_in_at, Some(test_clock().now()));
    }

    #[tokio::test]
    async fn cancelled_payment_is_refused() {
        let (authority, store) = authority().await;
        let credential = parse("SPH|GONE").unwrap();

        let result = authority.check_in(&credential).await.unwrap();

        assert_eq!(result.reason(), Some(ReasonCode::SphPaymentCancelled));
        assert_eq!(
            store.get(&credential).await.unwrap().attendance_status,
            AttendanceStatus::NotArrived
        );
    }

    #[test]
    fn unchanged_rows_are_explained() {
        let mut present = Participant::general("A", "Ana", "Lisbon");
        present.attendance_status = AttendanceStatus::Present;
        assert_eq!(
            CheckInAuthority::explain_unchanged(&present).unwrap(),
            CheckInResult::failure(ReasonCode::AlreadyPresent)
        );

        // Payment withdrawn between lookup and write
        let pending = Participant::workshop("W", "Bo", "Porto", PaymentStatus::Pending);
        assert_eq!(
            CheckInAuthority::explain_unchanged(&pending).unwrap(),
            CheckInResult::failure(ReasonCode::SphPaymentPending)
        );

        let eligible = Participant::general("B", "Cy", "Braga");
        assert!(matches!(
            CheckInAuthority::explain_unchanged(&eligible),
            Err(CheckInError::Store(StoreError::Inconsistent(_)))
        ));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let (authority, store) = authority().await;
        let authority = authority.with_store_timeout(Duration::from_millis(20));
        store.set_latency(Duration::from_millis(200));

        let error = authority
            .check_in(&parse("GENERAL|ABC123").unwrap())
            .await
            .unwrap_err();

        assert_eq!(
            error,
            CheckInError::Timeout {
                elapsed: Duration::from_millis(20)
            }
        );
        assert!(error.is_retryable());
        assert_eq!(error.kind(), "timeout");
    }

    #[tokio::test]
    async fn store_outage_propagates() {
        let (authority, store) = authority().await;
        store.set_outage(true);

        let error = authority
            .check_in(&parse("GENERAL|ABC123").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(error, CheckInError::Store(StoreError::Unavailable(_))));
    }
}
