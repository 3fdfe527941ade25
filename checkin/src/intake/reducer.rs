//! Scan intake reducer.
//!
//! One state machine per scanning session:
//!
//! ```text
//! Idle ──accept──▶ InFlight ──AttemptCompleted──▶ Cooldown ──CooldownElapsed──▶ Idle
//!                                                    │
//!                                                    └──different payload──▶ InFlight
//! ```
//!
//! - While `InFlight`, every new payload is discarded.
//! - A decoded frame identical to the last completed attempt is discarded
//!   until that attempt's cooldown deadline passes.
//! - Manual submissions skip the duplicate check but not the in-flight gate.

use super::actions::{ScanAction, ScanOutcome};
use super::environment::ScanEnvironment;
use crate::credential;
use crate::types::{CheckInResult, DeviceId};
use chrono::{DateTime, TimeDelta, Utc};
use gatecheck_core::{SmallVec, async_effect, delay, effect::Effect, reducer::Reducer, smallvec};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Where an attempt came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    /// Camera decode stream
    Camera,
    /// Operator-typed code
    Manual,
}

/// Gate phase
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    /// Ready for the next payload
    #[default]
    Idle,
    /// An attempt is waiting for the authority
    InFlight {
        /// Attempt sequence number
        sequence: u64,
        /// Trimmed payload being verified
        payload: String,
        /// Input source
        source: ScanSource,
    },
    /// An attempt just completed
    Cooldown {
        /// Sequence of the completed attempt
        sequence: u64,
        /// End of the duplicate window
        until: DateTime<Utc>,
    },
}

impl ScanPhase {
    /// Whether an attempt is outstanding
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }
}

/// The most recent completed attempt, used as the duplicate key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAttempt {
    /// Trimmed payload
    pub payload: String,
    /// Identical frames are discarded until this instant
    pub until: DateTime<Utc>,
}

/// Per-session counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeCounters {
    /// Attempts sent to the dispatcher
    pub forwarded: u64,
    /// Payloads discarded because an attempt was in flight
    pub suppressed_in_flight: u64,
    /// Frames discarded as duplicates of the last attempt
    pub suppressed_duplicate: u64,
}

/// State of one scanning session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSessionState {
    /// Station this session belongs to
    pub device: DeviceId,
    /// Gate phase
    pub phase: ScanPhase,
    /// Last sequence number handed out
    pub sequence: u64,
    /// Duplicate key
    pub last_attempt: Option<LastAttempt>,
    /// Outcome of the last completed attempt
    pub last_outcome: Option<ScanOutcome>,
    /// Counters
    pub counters: IntakeCounters,
}

impl ScanSessionState {
    /// Fresh idle session for `device`
    #[must_use]
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            phase: ScanPhase::Idle,
            sequence: 0,
            last_attempt: None,
            last_outcome: None,
            counters: IntakeCounters::default(),
        }
    }

    fn is_duplicate(&self, payload: &str, now: DateTime<Utc>) -> bool {
        self.last_attempt
            .as_ref()
            .is_some_and(|last| last.payload == payload && now < last.until)
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the scan intake loop
#[derive(Clone, Debug, Default)]
pub struct ScanSessionReducer;

impl ScanSessionReducer {
    /// Creates a new `ScanSessionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn suppress_in_flight(state: &mut ScanSessionState) -> SmallVec<[Effect<ScanAction>; 4]> {
        state.counters.suppressed_in_flight += 1;
        counter!("scan.intake.suppressed.total", "reason" => "in_flight").increment(1);
        tracing::trace!(device = %state.device, "Payload discarded while attempt in flight");
        smallvec![Effect::None]
    }

    fn start_attempt(
        state: &mut ScanSessionState,
        payload: String,
        source: ScanSource,
        request: Option<u64>,
        env: &ScanEnvironment,
    ) -> SmallVec<[Effect<ScanAction>; 4]> {
        state.sequence += 1;
        let sequence = state.sequence;
        let parsed = credential::parse(&payload);
        state.phase = ScanPhase::InFlight {
            sequence,
            payload,
            source,
        };

        match parsed {
            Ok(credential) => {
                state.counters.forwarded += 1;
                counter!("scan.intake.forwarded.total").increment(1);
                tracing::debug!(device = %state.device, sequence, %credential, "Forwarding scan");

                let dispatcher = Arc::clone(&env.dispatcher);
                let device = state.device.clone();
                smallvec![async_effect! {
                    let outcome = dispatcher.dispatch(credential, device).await;
                    Some(ScanAction::AttemptCompleted { sequence, request, outcome })
                }]
            },
            Err(error) => {
                tracing::debug!(device = %state.device, sequence, %error, "Unreadable scan");
                let outcome = ScanOutcome::completed(CheckInResult::failure(error.reason()));
                smallvec![async_effect! {
                    Some(ScanAction::AttemptCompleted { sequence, request, outcome })
                }]
            },
        }
    }
}

impl Reducer for ScanSessionReducer {
    type State = ScanSessionState;
    type Action = ScanAction;
    type Environment = ScanEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ScanAction::FrameDecoded { payload } => {
                let payload = payload.trim();
                if payload.is_empty() {
                    return smallvec![Effect::None];
                }
                if state.phase.is_in_flight() {
                    return Self::suppress_in_flight(state);
                }
                if state.is_duplicate(payload, env.clock.now()) {
                    state.counters.suppressed_duplicate += 1;
                    counter!("scan.intake.suppressed.total", "reason" => "duplicate")
                        .increment(1);
                    return smallvec![Effect::None];
                }
                Self::start_attempt(state, payload.to_string(), ScanSource::Camera, None, env)
            },

            ScanAction::ManualSubmitted { payload, request } => {
                if state.phase.is_in_flight() {
                    return Self::suppress_in_flight(state);
                }
                Self::start_attempt(
                    state,
                    payload.trim().to_string(),
                    ScanSource::Manual,
                    Some(request),
                    env,
                )
            },

            ScanAction::AttemptCompleted {
                sequence, outcome, ..
            } => {
                let ScanPhase::InFlight {
                    sequence: current,
                    payload,
                    ..
                } = &state.phase
                else {
                    return smallvec![Effect::None];
                };
                if *current != sequence {
                    return smallvec![Effect::None];
                }

                let until = TimeDelta::from_std(env.cooldown)
                    .ok()
                    .and_then(|window| env.clock.now().checked_add_signed(window))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);

                state.last_attempt = Some(LastAttempt {
                    payload: payload.clone(),
                    until,
                });
                state.last_outcome = Some(outcome);
                state.phase = ScanPhase::Cooldown { sequence, until };

                smallvec![delay! {
                    duration: env.cooldown,
                    action: ScanAction::CooldownElapsed { sequence }
                }]
            },

            ScanAction::CooldownElapsed { sequence } => {
                let expired = matches!(
                    state.phase,
                    ScanPhase::Cooldown { sequence: current, .. } if current == sequence
                );
                if expired {
                    state.phase = ScanPhase::Idle;
                }
                smallvec![Effect::None]
            },
        }
    }
}
