//! `PostgreSQL` participant store.
//!
//! The attendance transition is one conditional `UPDATE ... RETURNING`; the
//! row lock taken by the update serializes concurrent scanners, and the
//! `WHERE` clause re-checks both the attendance and the payment condition, so
//! at most one caller ever sees the update apply. Stored payment statuses are
//! compared trimmed and case-insensitively, the same way
//! [`PaymentStatus`] parses them.

use super::{AttendanceTransition, NamespaceCount, ParticipantStore, RosterQuery, StoreError};
use crate::credential::Credential;
use crate::types::{
    AttendanceStatus, Namespace, Participant, ParticipantId, ParticipantSnapshot, PaymentStatus,
    TicketToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const PARTICIPANT_COLUMNS: &str = "id, namespace, ticket_token, display_name, origin_label, \
     payment_status, attendance_status, checked_in_at";

/// Row shape of the `participants` table
#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    namespace: String,
    ticket_token: String,
    display_name: String,
    origin_label: String,
    payment_status: Option<String>,
    attendance_status: String,
    checked_in_at: Option<DateTime<Utc>>,
}

impl TryFrom<ParticipantRow> for Participant {
    type Error = StoreError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        let namespace: Namespace = row.namespace.parse().map_err(|_| {
            StoreError::Corrupt(format!(
                "participant {} has namespace `{}`",
                row.id, row.namespace
            ))
        })?;
        let attendance_status = AttendanceStatus::parse(&row.attendance_status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "participant {} has attendance status `{}`",
                row.id, row.attendance_status
            ))
        })?;

        Ok(Self {
            id: ParticipantId::from_uuid(row.id),
            namespace,
            ticket_token: TicketToken::new(row.ticket_token),
            display_name: row.display_name,
            origin_label: row.origin_label,
            payment_status: row.payment_status.map(PaymentStatus::from),
            attendance_status,
            checked_in_at: row.checked_in_at,
        })
    }
}

fn map_sqlx(context: &str, error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{context}: {error}"))
        },
        other => StoreError::Database(format!("{context}: {other}")),
    }
}

/// `PostgreSQL`-backed participant store.
#[derive(Clone)]
pub struct PostgresParticipantStore {
    pool: Arc<PgPool>,
}

impl PostgresParticipantStore {
    /// Creates a new `PostgresParticipantStore`.
    #[must_use]
    pub const fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connect a pool with the given limits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        Ok(Self::new(Arc::new(pool)))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Register a participant (registration collaborator / fixtures).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the namespace already holds the
    /// token, or another [`StoreError`] if the insert fails.
    pub async fn insert(&self, participant: &Participant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO participants
                 (id, namespace, ticket_token, display_name, origin_label,
                  payment_status, attendance_status, checked_in_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(participant.id.as_uuid())
        .bind(participant.namespace.as_str())
        .bind(participant.ticket_token.as_str())
        .bind(&participant.display_name)
        .bind(&participant.origin_label)
        .bind(participant.payment_status.as_ref().map(PaymentStatus::as_str))
        .bind(participant.attendance_status.as_str())
        .bind(participant.checked_in_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate {
                namespace: participant.namespace,
                token: participant.ticket_token.as_str().to_string(),
            },
            other => map_sqlx("Failed to insert participant", other),
        })?;

        Ok(())
    }

    /// Change a workshop participant's payment status (payment collaborator).
    ///
    /// Returns whether the participant exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn set_payment_status(
        &self,
        token: &str,
        status: &PaymentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE participants SET payment_status = $1
             WHERE namespace = 'WORKSHOP' AND ticket_token = $2",
        )
        .bind(status.as_str())
        .bind(token)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx("Failed to update payment status", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ParticipantStore for PostgresParticipantStore {
    #[tracing::instrument(skip(self), fields(backend = "postgres"))]
    async fn find(&self, credential: &Credential) -> Result<Option<Participant>, StoreError> {
        let row: Option<ParticipantRow> = sqlx::query_as(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants
             WHERE namespace = $1 AND ticket_token = $2"
        ))
        .bind(credential.namespace().as_str())
        .bind(credential.token().as_str())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx("Failed to query participant", e))?;

        row.map(Participant::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(backend = "postgres"))]
    async fn mark_present(
        &self,
        credential: &Credential,
        at: DateTime<Utc>,
    ) -> Result<AttendanceTransition, StoreError> {
        let updated: Option<ParticipantRow> = sqlx::query_as(&format!(
            "UPDATE participants
             SET attendance_status = 'PRESENT', checked_in_at = $3
             WHERE namespace = $1 AND ticket_token = $2
               AND attendance_status = 'NOT_ARRIVED'
               AND (namespace = 'GENERAL' OR UPPER(TRIM(payment_status)) = 'PAID')
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(credential.namespace().as_str())
        .bind(credential.token().as_str())
        .bind(at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx("Failed to mark participant present", e))?;

        if let Some(row) = updated {
            return Ok(AttendanceTransition::Transitioned(row.try_into()?));
        }

        Ok(match self.find(credential).await? {
            Some(current) => AttendanceTransition::Unchanged(current),
            None => AttendanceTransition::Missing,
        })
    }

    async fn recently_present(
        &self,
        query: RosterQuery,
    ) -> Result<Vec<ParticipantSnapshot>, StoreError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows: Vec<ParticipantRow> = sqlx::query_as(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants
             WHERE attendance_status = 'PRESENT'
               AND ($1::TEXT IS NULL OR namespace = $1)
             ORDER BY checked_in_at DESC, display_name ASC
             LIMIT $2"
        ))
        .bind(query.namespace.map(Namespace::as_str))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx("Failed to query roster", e))?;

        rows.into_iter()
            .map(|row| Participant::try_from(row).map(|p| p.snapshot()))
            .collect()
    }

    async fn attendance_counts(&self) -> Result<Vec<NamespaceCount>, StoreError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT namespace,
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE attendance_status = 'PRESENT') AS present
             FROM participants
             GROUP BY namespace",
        )
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx("Failed to count attendance", e))?;

        let mut counts: Vec<NamespaceCount> = [Namespace::General, Namespace::Workshop]
            .into_iter()
            .map(|namespace| NamespaceCount {
                namespace,
                total: 0,
                present: 0,
            })
            .collect();

        for (namespace, total, present) in rows {
            let namespace: Namespace = namespace
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("attendance counts: {e}")))?;
            if let Some(count) = counts.iter_mut().find(|c| c.namespace == namespace) {
                count.total = u64::try_from(total).unwrap_or(0);
                count.present = u64::try_from(present).unwrap_or(0);
            }
        }

        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx("Ping failed", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
