//! Presence roster feed.
//!
//! Read-only views over the participant store for dashboards. Every call is
//! independent: no cursor, no cached state, nothing to coordinate between
//! clients polling at the same time.

use crate::store::{NamespaceCount, ParticipantStore, RosterQuery, StoreError};
use crate::types::{Namespace, ParticipantSnapshot};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entries returned when the caller gives no limit
pub const DEFAULT_LIMIT: usize = 20;

/// Largest page a caller may ask for
pub const MAX_LIMIT: usize = 100;

/// Attendance numbers across both namespaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// Per-namespace counts, general first
    pub namespaces: Vec<NamespaceCount>,
    /// Registered participants
    pub total: u64,
    /// Participants checked in
    pub present: u64,
}

impl AttendanceSummary {
    /// Fold per-namespace counts into a summary.
    #[must_use]
    pub fn from_counts(namespaces: Vec<NamespaceCount>) -> Self {
        let total = namespaces.iter().map(|c| c.total).sum();
        let present = namespaces.iter().map(|c| c.present).sum();
        Self {
            namespaces,
            total,
            present,
        }
    }
}

/// Read model of who has arrived.
#[derive(Clone)]
pub struct RosterFeed {
    store: Arc<dyn ParticipantStore>,
    default_limit: usize,
    max_limit: usize,
}

impl RosterFeed {
    /// Create a feed with the default page sizes.
    #[must_use]
    pub fn new(store: Arc<dyn ParticipantStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Override the page sizes. `max_limit` is raised to at least 1 and
    /// `default_limit` is clamped into `1..=max_limit`.
    #[must_use]
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    /// Build a store query from caller input.
    #[must_use]
    pub fn query(&self, limit: Option<usize>, namespace: Option<Namespace>) -> RosterQuery {
        RosterQuery {
            limit: limit.unwrap_or(self.default_limit).clamp(1, self.max_limit),
            namespace,
        }
    }

    /// Participants checked in, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn recently_present(
        &self,
        limit: Option<usize>,
        namespace: Option<Namespace>,
    ) -> Result<Vec<ParticipantSnapshot>, StoreError> {
        counter!("roster.queries.total", "kind" => "recent").increment(1);
        self.store
            .recently_present(self.query(limit, namespace))
            .await
    }

    /// Registered and present counts per namespace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn attendance_summary(&self) -> Result<AttendanceSummary, StoreError> {
        counter!("roster.queries.total", "kind" => "summary").increment(1);
        let counts = self.store.attendance_counts().await?;
        Ok(AttendanceSummary::from_counts(counts))
    }
}
