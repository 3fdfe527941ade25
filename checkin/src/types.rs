//! Domain types for check-in verification.
//!
//! Participants live in one of two namespaces: the general event and the paid
//! workshop. Workshop participants carry a payment status that gates entry.
//! Attendance moves one way only, from `NOT_ARRIVED` to `PRESENT`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a participant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Creates a new random `ParticipantId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ParticipantId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque ticket token embedded in a participant's QR code.
///
/// Unique within its namespace. Compared case-sensitively.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketToken(String);

impl TicketToken {
    /// Wrap a token value
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical identity of a scanning station.
///
/// Dedup windows are kept per device. Blank identifiers collapse to
/// [`DeviceId::UNKNOWN`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Identifier used when a station does not name itself
    pub const UNKNOWN: &'static str = "unknown-device";

    /// Create a device id; surrounding whitespace is dropped
    #[must_use]
    pub fn new(value: impl AsRef<str>) -> Self {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            Self(Self::UNKNOWN.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Device id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self(Self::UNKNOWN.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Participant population a credential belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Namespace {
    /// General event attendees
    General,
    /// Paid workshop attendees
    Workshop,
}

impl Namespace {
    /// Stored / wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Workshop => "WORKSHOP",
        }
    }

    /// Reason reported when a token of this namespace matches nobody
    #[must_use]
    pub const fn not_found_reason(self) -> ReasonCode {
        match self {
            Self::General => ReasonCode::NotFound,
            Self::Workshop => ReasonCode::SphNotFound,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised namespace name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown namespace: {0}")]
pub struct UnknownNamespace(pub String);

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENERAL" => Ok(Self::General),
            "WORKSHOP" | "SPH" => Ok(Self::Workshop),
            _ => Err(UnknownNamespace(s.to_string())),
        }
    }
}

/// Workshop payment status, written by the payment collaborator
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    /// Awaiting payment approval
    Pending,
    /// Payment approved
    Paid,
    /// Payment cancelled
    Cancelled,
    /// A value this service does not know
    Unrecognized(String),
}

impl PaymentStatus {
    /// Stored / wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "PAID" => Self::Paid,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<PaymentStatus> for String {
    fn from(value: PaymentStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Attendance of a participant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// Not checked in yet
    NotArrived,
    /// Checked in
    Present,
}

impl AttendanceStatus {
    /// Stored / wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotArrived => "NOT_ARRIVED",
            Self::Present => "PRESENT",
        }
    }

    /// Parse a stored value
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_ARRIVED" => Some(Self::NotArrived),
            "PRESENT" => Some(Self::Present),
            _ => None,
        }
    }
}

/// Why a check-in failed.
///
/// Every code is an expected outcome shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Empty or unparseable credential
    MissingQr,
    /// General-namespace token matches nobody
    NotFound,
    /// Workshop-namespace token matches nobody
    SphNotFound,
    /// Participant was already checked in
    AlreadyPresent,
    /// Workshop payment still pending
    SphPaymentPending,
    /// Workshop payment cancelled
    SphPaymentCancelled,
    /// Workshop payment missing or in an unknown state
    SphNotPaid,
}

impl ReasonCode {
    /// Wire code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingQr => "MISSING_QR",
            Self::NotFound => "NOT_FOUND",
            Self::SphNotFound => "SPH_NOT_FOUND",
            Self::AlreadyPresent => "ALREADY_PRESENT",
            Self::SphPaymentPending => "SPH_PAYMENT_PENDING",
            Self::SphPaymentCancelled => "SPH_PAYMENT_CANCELLED",
            Self::SphNotPaid => "SPH_NOT_PAID",
        }
    }

    /// Operator-facing explanation
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingQr => "No readable ticket code. Scan again or type the code.",
            Self::NotFound => "Ticket not found for the main event.",
            Self::SphNotFound => "Ticket not found for the workshop.",
            Self::AlreadyPresent => "This participant has already checked in.",
            Self::SphPaymentPending => {
                "Workshop payment is still pending. Send the attendee to the payment desk."
            },
            Self::SphPaymentCancelled => "Workshop payment was cancelled. Entry denied.",
            Self::SphNotPaid => "Workshop payment has not been completed.",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Participant
// ============================================================================

/// A registered participant.
///
/// Created by registration collaborators; this service only ever moves
/// `attendance_status` from `NotArrived` to `Present`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant id
    pub id: ParticipantId,
    /// Namespace, immutable
    pub namespace: Namespace,
    /// QR token, unique within the namespace
    pub ticket_token: TicketToken,
    /// Name shown to staff
    pub display_name: String,
    /// Institution or city
    pub origin_label: String,
    /// Payment status (workshop only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    /// Attendance
    pub attendance_status: AttendanceStatus,
    /// When the participant was checked in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// New general-event participant who has not arrived
    #[must_use]
    pub fn general(
        token: impl Into<String>,
        display_name: impl Into<String>,
        origin_label: impl Into<String>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            namespace: Namespace::General,
            ticket_token: TicketToken::new(token),
            display_name: display_name.into(),
            origin_label: origin_label.into(),
            payment_status: None,
            attendance_status: AttendanceStatus::NotArrived,
            checked_in_at: None,
        }
    }

    /// New workshop participant who has not arrived
    #[must_use]
    pub fn workshop(
        token: impl Into<String>,
        display_name: impl Into<String>,
        origin_label: impl Into<String>,
        payment_status: PaymentStatus,
    ) -> Self {
        Self {
            namespace: Namespace::Workshop,
            payment_status: Some(payment_status),
            ..Self::general(token, display_name, origin_label)
        }
    }

    /// Whether the participant is already checked in
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.attendance_status == AttendanceStatus::Present
    }

    /// Reason the payment gate refuses this participant, if any.
    ///
    /// General participants always pass.
    #[must_use]
    pub fn payment_gate(&self) -> Option<ReasonCode> {
        match (self.namespace, &self.payment_status) {
            (Namespace::General, _) | (Namespace::Workshop, Some(PaymentStatus::Paid)) => None,
            (Namespace::Workshop, Some(PaymentStatus::Pending)) => {
                Some(ReasonCode::SphPaymentPending)
            },
            (Namespace::Workshop, Some(PaymentStatus::Cancelled)) => {
                Some(ReasonCode::SphPaymentCancelled)
            },
            (Namespace::Workshop, Some(PaymentStatus::Unrecognized(_)) | None) => {
                Some(ReasonCode::SphNotPaid)
            },
        }
    }

    /// Whether the conditional attendance write may apply
    #[must_use]
    pub fn can_transition(&self) -> bool {
        self.attendance_status == AttendanceStatus::NotArrived && self.payment_gate().is_none()
    }

    /// Display snapshot
    #[must_use]
    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: self.id,
            namespace: self.namespace,
            display_name: self.display_name.clone(),
            origin_label: self.origin_label.clone(),
            checked_in_at: self.checked_in_at,
        }
    }
}

/// Denormalized participant view for scanning stations and dashboards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    /// Participant id
    pub id: ParticipantId,
    /// Namespace
    pub namespace: Namespace,
    /// Name shown to staff
    pub display_name: String,
    /// Institution or city
    pub origin_label: String,
    /// When the participant was checked in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Check-in result
// ============================================================================

/// Whether a verification call checked the participant in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInOutcome {
    /// Checked in by this call
    Success,
    /// Not checked in
    Failure,
}

impl CheckInOutcome {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// Outcome of one verification call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInResult {
    /// The participant was checked in by this call
    Success {
        /// Who was checked in
        participant: ParticipantSnapshot,
    },
    /// The participant was not checked in
    Failure {
        /// Why
        reason: ReasonCode,
    },
}

impl CheckInResult {
    /// Failure with the given reason
    #[must_use]
    pub const fn failure(reason: ReasonCode) -> Self {
        Self::Failure { reason }
    }

    /// Whether this call checked the participant in
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure reason, if any
    #[must_use]
    pub const fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(*reason),
        }
    }

    /// `SUCCESS` or `FAILURE`
    #[must_use]
    pub const fn outcome(&self) -> CheckInOutcome {
        match self {
            Self::Success { .. } => CheckInOutcome::Success,
            Self::Failure { .. } => CheckInOutcome::Failure,
        }
    }

    /// Operator-facing message
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Success { participant } => {
                format!(
                    "Welcome, {} ({}).",
                    participant.display_name, participant.origin_label
                )
            },
            Self::Failure { reason } => reason.message().to_string(),
        }
    }
}
