//! Application state for the check-in HTTP server.

use crate::service::CheckInService;

/// State shared across all HTTP handlers.
///
/// Cloned per request; the service is `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    /// Check-in and roster service
    pub service: CheckInService,
}

impl AppState {
    /// Create the application state.
    #[must_use]
    pub const fn new(service: CheckInService) -> Self {
        Self { service }
    }
}
