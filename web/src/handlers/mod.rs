//! Shared HTTP handlers.

pub mod health;

pub use health::{ReadinessReport, health_check, readiness_response};
