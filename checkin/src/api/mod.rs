//! HTTP API handlers.
//!
//! - Check-in: verify a scanned payload
//! - Roster: presence dashboards (read-only)

pub mod checkin;
pub mod roster;

pub use checkin::{CheckInRequest, CheckInResponse, submit_check_in};
pub use roster::{RecentQuery, attendance_summary, recently_present};
