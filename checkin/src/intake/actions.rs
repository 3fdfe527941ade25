//! Actions and outcomes of a scanning session.

use crate::types::CheckInResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Actions
// ============================================================================

/// Actions for the scan intake reducer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanAction {
    /// The camera decoder produced a payload
    FrameDecoded {
        /// Raw decoded text
        payload: String,
    },

    /// The operator typed a payload and pressed submit
    ManualSubmitted {
        /// Raw entered text
        payload: String,
        /// Caller-chosen id, echoed on the completion
        request: u64,
    },

    /// The attempt with this sequence number finished
    AttemptCompleted {
        /// Attempt sequence number
        sequence: u64,
        /// Request id of a manual submission; `None` for camera frames
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<u64>,
        /// What the authority answered
        outcome: ScanOutcome,
    },

    /// The cooldown started by this attempt is over
    CooldownElapsed {
        /// Attempt sequence number
        sequence: u64,
    },
}

// ============================================================================
// Outcomes
// ============================================================================

/// What one forwarded scan attempt produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The authority answered
    Completed {
        /// The verification result
        result: CheckInResult,
    },

    /// The authority could not be reached or did not answer in time.
    ///
    /// The operator may scan again; the check-in is idempotent.
    Unavailable {
        /// Operator-facing explanation
        message: String,
    },
}

impl ScanOutcome {
    /// Wrap a verification result
    #[must_use]
    pub const fn completed(result: CheckInResult) -> Self {
        Self::Completed { result }
    }

    /// Whether the participant was checked in
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { result } if result.is_success())
    }

    /// The verification result, if the authority answered
    #[must_use]
    pub const fn result(&self) -> Option<&CheckInResult> {
        match self {
            Self::Completed { result } => Some(result),
            Self::Unavailable { .. } => None,
        }
    }

    /// Text for the operator's display
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Completed { result } => result.message(),
            Self::Unavailable { message } => message.clone(),
        }
    }
}
