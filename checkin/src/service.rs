//! Inbound check-in service.
//!
//! Entry point for scanning stations and dashboards: decodes raw payloads,
//! hands credentials to the [`CheckInAuthority`] and serves roster reads.

use crate::authority::{CheckInAuthority, CheckInError};
use crate::config::CheckInConfig;
use crate::credential::{self, Credential};
use crate::metrics;
use crate::roster::{AttendanceSummary, RosterFeed};
use crate::store::{ParticipantStore, StoreError};
use crate::types::{CheckInResult, DeviceId, Namespace, ParticipantSnapshot};
use gatecheck_core::environment::Clock;
use gatecheck_runtime::HealthCheck;
use std::sync::Arc;

/// Check-in service shared by the HTTP API and in-process scanning stations.
#[derive(Clone)]
pub struct CheckInService {
    authority: CheckInAuthority,
    roster: RosterFeed,
}

impl CheckInService {
    /// Create a service over `store` with default timeouts and page sizes.
    #[must_use]
    pub fn new(store: Arc<dyn ParticipantStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            authority: CheckInAuthority::new(Arc::clone(&store), clock),
            roster: RosterFeed::new(store),
        }
    }

    /// Create a service configured from [`CheckInConfig`].
    #[must_use]
    pub fn from_config(
        store: Arc<dyn ParticipantStore>,
        clock: Arc<dyn Clock>,
        config: &CheckInConfig,
    ) -> Self {
        Self {
            authority: CheckInAuthority::new(Arc::clone(&store), clock)
                .with_store_timeout(config.store_timeout()),
            roster: RosterFeed::new(store)
                .with_limits(config.roster_default_limit, config.roster_max_limit),
        }
    }

    /// The authority behind this service
    #[must_use]
    pub const fn authority(&self) -> &CheckInAuthority {
        &self.authority
    }

    /// The roster feed behind this service
    #[must_use]
    pub const fn roster(&self) -> &RosterFeed {
        &self.roster
    }

    /// Decode a raw scanner payload and check the participant in.
    ///
    /// Payloads that do not decode fail with `MISSING_QR` without touching the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError`] if the store times out or fails.
    #[tracing::instrument(skip(self, raw), fields(device = %device))]
    pub async fn submit_scan(
        &self,
        raw: &str,
        device: &DeviceId,
    ) -> Result<CheckInResult, CheckInError> {
        match credential::parse(raw) {
            Ok(credential) => self.authority.check_in(&credential).await,
            Err(error) => {
                let result = CheckInResult::failure(error.reason());
                metrics::record_attempt(None, &result);
                tracing::info!(%error, "Rejected undecodable payload");
                Ok(result)
            },
        }
    }

    /// Check in an already decoded credential.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError`] if the store times out or fails.
    #[tracing::instrument(skip(self, credential), fields(device = %device))]
    pub async fn check_in(
        &self,
        credential: &Credential,
        device: &DeviceId,
    ) -> Result<CheckInResult, CheckInError> {
        self.authority.check_in(credential).await
    }

    /// Participants checked in, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn recently_present(
        &self,
        limit: Option<usize>,
        namespace: Option<Namespace>,
    ) -> Result<Vec<ParticipantSnapshot>, StoreError> {
        self.roster.recently_present(limit, namespace).await
    }

    /// Registered and present counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn attendance_summary(&self) -> Result<AttendanceSummary, StoreError> {
        self.roster.attendance_summary().await
    }

    /// Readiness of the participant store.
    pub async fn store_health(&self) -> HealthCheck {
        let store = self.authority.store();
        match store.ping().await {
            Ok(()) => HealthCheck::healthy("participant_store")
                .with_metadata("backend", store.backend()),
            Err(error) => {
                tracing::warn!(%error, "Participant store health check failed");
                HealthCheck::unhealthy("participant_store", error.to_string())
                    .with_metadata("backend", store.backend())
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryParticipantStore;
    use crate::types::{Participant, ReasonCode};
    use gatecheck_runtime::HealthStatus;
    use gatecheck_testing::test_clock;

    async fn service() -> (CheckInService, InMemoryParticipantStore) {
        let store =
            InMemoryParticipantStore::with_participants([Participant::general(
                "ABC123", "Ana Lima", "Lisbon",
            )])
            .await
            .unwrap();
        (
            CheckInService::new(Arc::new(store.clone()), Arc::new(test_clock())),
            store,
        )
    }

    #[tokio::test]
    async fn undecodable_payload_skips_the_store() {
        let (service, store) = service().await;
        store.set_outage(true);

        let result = service
            .submit_scan("   ", &DeviceId::default())
            .await
            .unwrap();

        assert_eq!(result, CheckInResult::failure(ReasonCode::MissingQr));
    }

    #[tokio::test]
    async fn health_reflects_store_outage() {
        let (service, store) = service().await;
        assert_eq!(service.store_health().await.status, HealthStatus::Healthy);

        store.set_outage(true);
        let check = service.store_health().await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert!(
            check
                .metadata
                .contains(&("backend".to_string(), "memory".to_string()))
        );
    }
}
