//! Event check-in verification.
//!
//! Scanning stations read a participant's code, this crate decides whether
//! the participant may enter and records the arrival exactly once.
//!
//! # Architecture
//!
//! ```text
//!  camera frames ─┐
//!                 ├─▶ ScanSession (intake gate, per device)
//!  manual entry ──┘          │
//!                            ▼  ScanDispatcher (local or HTTP)
//!                     CheckInService::submit_scan
//!                            │  credential::parse
//!                            ▼
//!                     CheckInAuthority ──▶ ParticipantStore::mark_present
//!                                            (conditional write)
//!  dashboards ──▶ RosterFeed ──▶ ParticipantStore (read-only)
//! ```
//!
//! # Key Properties
//!
//! ## 1. At-most-once attendance
//!
//! The only mutation is a conditional write that applies while the
//! participant is `NOT_ARRIVED` (and, for the workshop, `PAID`). Of N
//! concurrent scans of one ticket exactly one succeeds; the rest observe
//! `ALREADY_PRESENT`.
//!
//! ## 2. Expected failures are values
//!
//! Unknown tickets, pending payments and re-scans are [`CheckInResult::Failure`]
//! with a [`ReasonCode`]. Only timeouts and store outages are errors, and both
//! are safe to retry.
//!
//! ## 3. Client-side suppression
//!
//! Each station keeps one attempt in flight and discards repeated frames of
//! the same code for a short cooldown. This only saves load; correctness
//! rests on the store's conditional write.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod authority;
pub mod bootstrap;
pub mod config;
pub mod credential;
pub mod intake;
pub mod metrics;
pub mod roster;
pub mod server;
pub mod service;
pub mod store;
pub mod types;

pub use authority::{CheckInAuthority, CheckInError};
pub use config::Config;
pub use credential::{Credential, ParseError};
pub use intake::{ScanAction, ScanDispatcher, ScanEnvironment, ScanOutcome, ScanSession};
pub use roster::{AttendanceSummary, RosterFeed};
pub use service::CheckInService;
pub use store::{InMemoryParticipantStore, ParticipantStore, PostgresParticipantStore, StoreError};
pub use types::*;
