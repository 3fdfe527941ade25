//! Dependencies injected into the scan intake reducer.

use super::dispatcher::ScanDispatcher;
use gatecheck_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Default duplicate-suppression window
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Environment for [`ScanSessionReducer`](super::ScanSessionReducer)
#[derive(Clone)]
pub struct ScanEnvironment {
    /// Time source for the duplicate window
    pub clock: Arc<dyn Clock>,
    /// Where accepted attempts go
    pub dispatcher: Arc<dyn ScanDispatcher>,
    /// How long an identical payload is suppressed after an attempt completes
    pub cooldown: Duration,
}

impl ScanEnvironment {
    /// Creates a new `ScanEnvironment` with the default cooldown.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, dispatcher: Arc<dyn ScanDispatcher>) -> Self {
        Self {
            clock,
            dispatcher,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    /// Override the cooldown window.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}
