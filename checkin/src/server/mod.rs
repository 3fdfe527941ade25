//! HTTP server for the check-in service.
//!
//! - Application state shared by handlers
//! - Liveness and readiness endpoints
//! - Router configuration, including the Prometheus scrape router

pub mod health;
pub mod routes;
pub mod state;

pub use health::readiness_check;
pub use routes::{build_router, metrics_router};
pub use state::AppState;
