#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::credential::Credential;
use crate::types::{CheckInResult, ReasonCode};
use chrono::TimeDelta;
use gatecheck_core::environment::Clock;
use gatecheck_core::effect::Effect;
use gatecheck_testing::{ReducerTest, assertions, test_clock};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

struct RefusingDispatcher;

impl ScanDispatcher for RefusingDispatcher {
    fn dispatch(
        &self,
        _credential: Credential,
        _device: DeviceId,
    ) -> Pin<Box<dyn Future<Output = ScanOutcome> + Send>> {
        Box::pin(async { ScanOutcome::completed(CheckInResult::failure(ReasonCode::NotFound)) })
    }
}

fn env() -> ScanEnvironment {
    ScanEnvironment::new(Arc::new(test_clock()), Arc::new(RefusingDispatcher))
}

fn idle() -> ScanSessionState {
    ScanSessionState::new(DeviceId::new("gate-a"))
}

fn in_flight(sequence: u64, payload: &str) -> ScanSessionState {
    ScanSessionState {
        sequence,
        phase: ScanPhase::InFlight {
            sequence,
            payload: payload.to_string(),
            source: ScanSource::Camera,
        },
        ..idle()
    }
}

fn refused() -> ScanOutcome {
    ScanOutcome::completed(CheckInResult::failure(ReasonCode::NotFound))
}

#[test]
fn decoded_frame_starts_an_attempt() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(idle())
        .when_action(ScanAction::FrameDecoded {
            payload: " GENERAL|ABC123\r\n".into(),
        })
        .then_state(|state| {
            assert_eq!(state.sequence, 1);
            assert_eq!(
                state.phase,
                ScanPhase::InFlight {
                    sequence: 1,
                    payload: "GENERAL|ABC123".into(),
                    source: ScanSource::Camera,
                }
            );
            assert_eq!(state.counters.forwarded, 1);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn blank_frame_is_ignored() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(idle())
        .when_action(ScanAction::FrameDecoded {
            payload: "   ".into(),
        })
        .then_state(|state| {
            assert_eq!(state.phase, ScanPhase::Idle);
            assert_eq!(state.counters, IntakeCounters::default());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn frames_are_discarded_while_in_flight() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(4, "GENERAL|ABC123"))
        .when_action(ScanAction::FrameDecoded {
            payload: "GENERAL|OTHER".into(),
        })
        .then_state(|state| {
            assert_eq!(state.sequence, 4);
            assert_eq!(state.counters.suppressed_in_flight, 1);
            assert_eq!(state.counters.forwarded, 0);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn manual_submission_respects_the_in_flight_gate() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(1, "GENERAL|ABC123"))
        .when_action(ScanAction::ManualSubmitted {
            payload: "GENERAL|ABC123".into(),
            request: 1,
        })
        .then_state(|state| {
            assert_eq!(state.counters.suppressed_in_flight, 1);
            assert!(state.phase.is_in_flight());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn completion_enters_cooldown() {
    let now = test_clock().now();

    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(1, "GENERAL|ABC123"))
        .when_action(ScanAction::AttemptCompleted {
            sequence: 1,
            request: None,
            outcome: refused(),
        })
        .then_state(move |state| {
            let until = now + TimeDelta::seconds(3);
            assert_eq!(state.phase, ScanPhase::Cooldown { sequence: 1, until });
            assert_eq!(
                state.last_attempt,
                Some(LastAttempt {
                    payload: "GENERAL|ABC123".into(),
                    until,
                })
            );
            assert_eq!(state.last_outcome, Some(refused()));
        })
        .then_effects(|effects| {
            assertions::assert_has_delayed_action(
                effects,
                &ScanAction::CooldownElapsed { sequence: 1 },
            );
        })
        .run();
}

#[test]
fn stale_completion_is_ignored() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(2, "GENERAL|ABC123"))
        .when_action(ScanAction::AttemptCompleted {
            sequence: 1,
            request: None,
            outcome: refused(),
        })
        .then_state(|state| {
            assert!(state.phase.is_in_flight());
            assert_eq!(state.last_outcome, None);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn identical_frame_is_discarded_during_cooldown() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(1, "GENERAL|ABC123"))
        .given_action(ScanAction::AttemptCompleted {
            sequence: 1,
            request: None,
            outcome: refused(),
        })
        .when_action(ScanAction::FrameDecoded {
            payload: "GENERAL|ABC123".into(),
        })
        .then_state(|state| {
            assert_eq!(state.counters.suppressed_duplicate, 1);
            assert_eq!(state.sequence, 1);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn different_frame_is_accepted_during_cooldown() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(1, "GENERAL|ABC123"))
        .given_action(ScanAction::AttemptCompleted {
            sequence: 1,
            request: None,
            outcome: refused(),
        })
        .when_action(ScanAction::FrameDecoded {
            payload: "SPH|XYZ9".into(),
        })
        .then_state(|state| {
            assert_eq!(state.sequence, 2);
            assert!(state.phase.is_in_flight());
            assert_eq!(state.counters.forwarded, 1);
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn manual_submission_bypasses_the_duplicate_window() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(in_flight(1, "GENERAL|ABC123"))
        .given_action(ScanAction::AttemptCompleted {
            sequence: 1,
            request: None,
            outcome: refused(),
        })
        .when_action(ScanAction::ManualSubmitted {
            payload: "GENERAL|ABC123".into(),
            request: 1,
        })
        .then_state(|state| {
            assert_eq!(state.sequence, 2);
            assert_eq!(state.counters.suppressed_duplicate, 0);
            assert!(matches!(
                state.phase,
                ScanPhase::InFlight {
                    source: ScanSource::Manual,
                    ..
                }
            ));
        })
        .run();
}

#[test]
fn cooldown_elapsed_returns_to_idle_only_for_its_attempt() {
    let now = test_clock().now();

    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(ScanSessionState {
            phase: ScanPhase::Cooldown {
                sequence: 3,
                until: now,
            },
            ..idle()
        })
        .when_action(ScanAction::CooldownElapsed { sequence: 2 })
        .then_state(|state| assert!(matches!(state.phase, ScanPhase::Cooldown { .. })))
        .run();

    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(ScanSessionState {
            phase: ScanPhase::Cooldown {
                sequence: 3,
                until: now,
            },
            ..idle()
        })
        .when_action(ScanAction::CooldownElapsed { sequence: 3 })
        .then_state(|state| assert_eq!(state.phase, ScanPhase::Idle))
        .run();
}

#[test]
fn unreadable_payload_completes_without_dispatch() {
    ReducerTest::new(ScanSessionReducer::new())
        .with_env(env())
        .given_state(idle())
        .when_action(ScanAction::FrameDecoded {
            payload: "https://example.org".into(),
        })
        .then_state(|state| {
            assert!(state.phase.is_in_flight());
            assert_eq!(state.counters.forwarded, 0);
        })
        .then_effects(|effects| {
            let [Effect::Future(_)] = effects else {
                panic!("expected a single future effect, got {effects:?}");
            };
        })
        .run();
}

#[tokio::test]
async fn unreadable_payload_resolves_to_missing_qr() {
    let session = ScanSession::new(DeviceId::new("gate-a"), env());

    let outcome = session
        .submit_manual_and_wait("", std::time::Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(ScanOutcome::completed(CheckInResult::failure(
            ReasonCode::MissingQr
        )))
    );
    assert_eq!(session.counters().await.forwarded, 0);
}
