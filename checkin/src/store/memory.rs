//! In-memory participant store.
//!
//! Used for development, single-process deployments seeded from a JSON file,
//! and tests. The conditional attendance write runs under the map's write lock,
//! which makes it atomic with respect to every other caller.

use super::{AttendanceTransition, NamespaceCount, ParticipantStore, RosterQuery, StoreError};
use crate::credential::Credential;
use crate::types::{
    AttendanceStatus, Namespace, Participant, ParticipantSnapshot, PaymentStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type Key = (Namespace, String);

fn key_of(credential: &Credential) -> Key {
    (credential.namespace(), credential.token().as_str().to_string())
}

/// Seed file record.
///
/// ```json
/// [
///   { "namespace": "GENERAL", "ticket_token": "ABC123",
///     "display_name": "Ana Lima", "origin_label": "Lisbon" },
///   { "namespace": "WORKSHOP", "ticket_token": "XYZ9",
///     "display_name": "Bo Chen", "origin_label": "Porto", "payment_status": "PAID" }
/// ]
/// ```
#[derive(Debug, Deserialize)]
struct SeedParticipant {
    namespace: Namespace,
    ticket_token: String,
    display_name: String,
    #[serde(default)]
    origin_label: String,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
}

impl From<SeedParticipant> for Participant {
    fn from(seed: SeedParticipant) -> Self {
        match seed.namespace {
            Namespace::General => {
                Self::general(seed.ticket_token, seed.display_name, seed.origin_label)
            },
            Namespace::Workshop => Self {
                payment_status: seed.payment_status,
                ..Self::workshop(
                    seed.ticket_token,
                    seed.display_name,
                    seed.origin_label,
                    PaymentStatus::Pending,
                )
            },
        }
    }
}

/// In-memory participant store.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryParticipantStore {
    participants: Arc<RwLock<HashMap<Key, Participant>>>,
    outage: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl InMemoryParticipantStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `participants`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if two participants share a
    /// namespace and token.
    pub async fn with_participants(
        participants: impl IntoIterator<Item = Participant>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for participant in participants {
            store.insert(participant).await?;
        }
        Ok(store)
    }

    /// Register a participant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the namespace already holds the token.
    pub async fn insert(&self, participant: Participant) -> Result<(), StoreError> {
        let key = (participant.namespace, participant.ticket_token.as_str().to_string());
        let mut participants = self.participants.write().await;

        if participants.contains_key(&key) {
            return Err(StoreError::Duplicate {
                namespace: key.0,
                token: key.1,
            });
        }

        participants.insert(key, participant);
        Ok(())
    }

    /// Change a workshop participant's payment status, as the payment
    /// collaborator would. Returns whether the participant exists.
    pub async fn set_payment_status(&self, token: &str, status: PaymentStatus) -> bool {
        let key = (Namespace::Workshop, token.to_string());
        self.participants
            .write()
            .await
            .get_mut(&key)
            .map(|participant| participant.payment_status = Some(status))
            .is_some()
    }

    /// Current record for a credential, bypassing outage simulation.
    pub async fn get(&self, credential: &Credential) -> Option<Participant> {
        self.participants
            .read()
            .await
            .get(&key_of(credential))
            .cloned()
    }

    /// Load participants from a JSON seed file.
    ///
    /// Returns the number of participants loaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the file cannot be read,
    /// [`StoreError::Corrupt`] if it is not a valid seed document, and
    /// [`StoreError::Duplicate`] on clashing tokens.
    pub async fn load_seed_file(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to read seed file {}: {e}", path.display()))
        })?;

        let seeds: Vec<SeedParticipant> = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Corrupt(format!("Failed to parse seed file {}: {e}", path.display()))
        })?;

        let count = seeds.len();
        for seed in seeds {
            self.insert(seed.into()).await?;
        }

        tracing::info!(path = %path.display(), count, "Seeded participant store");
        Ok(count)
    }

    /// Simulate the backend going down (`true`) or recovering (`false`).
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Delay every store call, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    async fn simulate_backend(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ParticipantStore for InMemoryParticipantStore {
    async fn find(&self, credential: &Credential) -> Result<Option<Participant>, StoreError> {
        self.simulate_backend().await?;
        Ok(self
            .participants
            .read()
            .await
            .get(&key_of(credential))
            .cloned())
    }

    async fn mark_present(
        &self,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<AttendanceTransition, StoreError> {
        self.simulate_backend().await?;

        let mut participants = self.participants.write().await;
        let Some(participant) = participants.get_mut(&key_of(credential)) else {
            return Ok(AttendanceTransition::Missing);
        };

        if !participant.can_transition() {
            return Ok(AttendanceTransition::Unchanged(participant.clone()));
        }

        participant.attendance_status = AttendanceStatus::Present;
        participant.checked_in_at = Some(at);
        Ok(AttendanceTransition::Transitioned(participant.clone()))
    }

    async fn recently_present(
        &self,
        query: RosterQuery,
    ) -> Result<Vec<ParticipantSnapshot>, StoreError> {
        self.simulate_backend().await?;

        let participants = self.participants.read().await;
        let mut present: Vec<&Participant> = participants
            .values()
            .filter(|p| p.is_present())
            .filter(|p| query.namespace.is_none_or(|ns| p.namespace == ns))
            .collect();

        present.sort_by(|a, b| {
            b.checked_in_at
                .cmp(&a.checked_in_at)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });

        Ok(present
            .into_iter()
            .take(query.limit)
            .map(Participant::snapshot)
            .collect())
    }

    async fn attendance_counts(&self) -> Result<Vec<NamespaceCount>, StoreError> {
        self.simulate_backend().await?;

        let participants = self.participants.read().await;
        let mut counts: Vec<NamespaceCount> = [Namespace::General, Namespace::Workshop]
            .into_iter()
            .map(|namespace| NamespaceCount {
                namespace,
                total: 0,
                present: 0,
            })
            .collect();

        for participant in participants.values() {
            if let Some(count) = counts
                .iter_mut()
                .find(|c| c.namespace == participant.namespace)
            {
                count.total += 1;
                if participant.is_present() {
                    count.present += 1;
                }
            }
        }

        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.simulate_backend().await
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::credential::parse;
    use gatecheck_core::environment::Clock;
    use gatecheck_testing::test_clock;

    async fn seeded() -> InMemoryParticipantStore {
        InMemoryParticipantStore::with_participants([
            Participant::general("ABC123", "Ana Lima", "Lisbon"),
            Participant::workshop("XYZ9", "Bo Chen", "Porto", PaymentStatus::Pending),
            Participant::workshop("PAID1", "Cy Dutra", "Braga", PaymentStatus::Paid),
        ])
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_tokens_are_rejected_per_namespace() {
        let store = seeded().await;

        let clash = store
            .insert(Participant::general("ABC123", "Other", "Faro"))
            .await;
        assert!(matches!(clash, Err(StoreError::Duplicate { .. })));

        // Same token in the other namespace is a different participant
        store
            .insert(Participant::workshop("ABC123", "Other", "Faro", PaymentStatus::Paid))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn conditional_write_applies_once() {
        let store = seeded().await;
        let credential = parse("GENERAL|ABC123").unwrap();
        let now = test_clock().now();

        let first = store.mark_present(&credential, now).await.unwrap();
        let AttendanceTransition::Transitioned(participant) = first else {
            panic!("expected transition, got {first:?}");
        };
        assert_eq!(participant.checked_in_at, Some(now));

        let second = store.mark_present(&credential, now).await.unwrap();
        assert!(matches!(second, AttendanceTransition::Unchanged(p) if p.is_present()));
    }

    #[tokio::test]
    async fn conditional_write_respects_payment() {
        let store = seeded().await;
        let credential = parse("SPH|XYZ9").unwrap();

        let result = store
            .mark_present(&credential, test_clock().now())
            .await
            .unwrap();
        assert!(matches!(result, AttendanceTransition::Unchanged(p) if !p.is_present()));

        assert!(store.set_payment_status("XYZ9", PaymentStatus::Paid).await);
        let result = store
            .mark_present(&credential, test_clock().now())
            .await
            .unwrap();
        assert!(matches!(result, AttendanceTransition::Transitioned(_)));
    }

    #[tokio::test]
    async fn unknown_credentials_are_missing() {
        let store = seeded().await;
        let credential = parse("SPH|ABC123").unwrap();

        assert_eq!(store.find(&credential).await.unwrap(), None);
        assert_eq!(
            store
                .mark_present(&credential, test_clock().now())
                .await
                .unwrap(),
            AttendanceTransition::Missing
        );
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = seeded().await;
        store.set_outage(true);

        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.attendance_counts().await.is_err());

        store.set_outage(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn counts_cover_both_namespaces() {
        let store = seeded().await;
        store
            .mark_present(&parse("SPH|PAID1").unwrap(), test_clock().now())
            .await
            .unwrap();

        let counts = store.attendance_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![
                NamespaceCount {
                    namespace: Namespace::General,
                    total: 1,
                    present: 0,
                },
                NamespaceCount {
                    namespace: Namespace::Workshop,
                    total: 2,
                    present: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn seed_file_loads_participants() {
        let path = std::env::temp_dir().join(format!("seed-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[
                {"namespace": "GENERAL", "ticket_token": "G1", "display_name": "Ana", "origin_label": "Lisbon"},
                {"namespace": "WORKSHOP", "ticket_token": "W1", "display_name": "Bo", "payment_status": "PAID"},
                {"namespace": "WORKSHOP", "ticket_token": "W2", "display_name": "Cy"}
            ]"#,
        )
        .await
        .unwrap();

        let store = InMemoryParticipantStore::new();
        assert_eq!(store.load_seed_file(&path).await.unwrap(), 3);

        let w1 = store.get(&parse("SPH|W1").unwrap()).await.unwrap();
        assert_eq!(w1.payment_status, Some(PaymentStatus::Paid));
        let w2 = store.get(&parse("SPH|W2").unwrap()).await.unwrap();
        assert_eq!(w2.payment_status, None);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn malformed_seed_file_is_corrupt() {
        let path = std::env::temp_dir().join(format!("seed-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = InMemoryParticipantStore::new().load_seed_file(&path).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
