//! Participant store.
//!
//! The store is the only shared mutable resource of the check-in service.
//! Reads are free; the single mutation is [`ParticipantStore::mark_present`],
//! a conditional write that applies only while the participant has not
//! arrived and (for the workshop) has paid. Two concurrent callers can never
//! both see it apply.

use crate::credential::Credential;
use crate::types::{Namespace, Participant, ParticipantSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryParticipantStore;
pub use postgres::PostgresParticipantStore;

/// Participant store errors.
///
/// These are infrastructure failures; "participant not found" is not one of them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend cannot be reached
    #[error("participant store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected a query
    #[error("participant store query failed: {0}")]
    Database(String),

    /// A stored row or seed record cannot be decoded
    #[error("corrupt participant record: {0}")]
    Corrupt(String),

    /// The store answered with a state that contradicts the request
    #[error("inconsistent participant store state: {0}")]
    Inconsistent(String),

    /// A participant with the same namespace and token already exists
    #[error("duplicate ticket token {token} in {namespace}")]
    Duplicate {
        /// Namespace of the clash
        namespace: Namespace,
        /// Clashing token
        token: String,
    },
}

/// Result of the conditional attendance write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceTransition {
    /// The write applied; the participant as stored afterwards
    Transitioned(Participant),
    /// The condition did not hold; the participant as currently stored
    Unchanged(Participant),
    /// No participant with this credential
    Missing,
}

/// Roster query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterQuery {
    /// Maximum number of entries
    pub limit: usize,
    /// Restrict to one namespace
    pub namespace: Option<Namespace>,
}

/// Attendance numbers for one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceCount {
    /// Namespace counted
    pub namespace: Namespace,
    /// Registered participants
    pub total: u64,
    /// Participants checked in
    pub present: u64,
}

/// Storage for participants of both namespaces.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Look up a participant by credential.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn find(&self, credential: &Credential) -> Result<Option<Participant>, StoreError>;

    /// Atomically mark a participant present.
    ///
    /// Applies only if the participant is `NOT_ARRIVED` and either belongs to
    /// the general namespace or has payment status `PAID`. Sets
    /// `checked_in_at = at` when it applies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn mark_present(
        &self,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<AttendanceTransition, StoreError>;

    /// Present participants, most recently checked in first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn recently_present(
        &self,
        query: RosterQuery,
    ) -> Result<Vec<ParticipantSnapshot>, StoreError>;

    /// Registered and present counts per namespace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn attendance_counts(&self) -> Result<Vec<NamespaceCount>, StoreError>;

    /// Check connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be reached.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}
