//! Scan intake loop.
//!
//! A [`ScanSession`] owns one station's gate. Camera frames and manual
//! submissions go in; at most one attempt per session is in flight, and the
//! decode stream never waits for it. Outcomes come back as
//! [`ScanAction::AttemptCompleted`] on [`ScanSession::subscribe`].

pub mod actions;
pub mod dispatcher;
pub mod environment;
pub mod reducer;

#[cfg(test)]
mod tests;

pub use actions::{ScanAction, ScanOutcome};
pub use dispatcher::{HttpDispatcher, LocalDispatcher, RETRY_MESSAGE, ScanDispatcher};
pub use environment::{DEFAULT_COOLDOWN, ScanEnvironment};
pub use reducer::{
    IntakeCounters, LastAttempt, ScanPhase, ScanSessionReducer, ScanSessionState, ScanSource,
};

use crate::types::DeviceId;
use futures::{Stream, StreamExt};
use gatecheck_runtime::{EffectHandle, HealthCheck, Store, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

type SessionStore = Store<ScanSessionState, ScanAction, ScanEnvironment, ScanSessionReducer>;

/// One scanning station's intake loop.
#[derive(Clone)]
pub struct ScanSession {
    device: DeviceId,
    store: SessionStore,
    requests: Arc<AtomicU64>,
}

impl ScanSession {
    /// Start an idle session for `device`.
    #[must_use]
    pub fn new(device: DeviceId, environment: ScanEnvironment) -> Self {
        let store = Store::new(
            ScanSessionState::new(device.clone()),
            ScanSessionReducer::new(),
            environment,
        );
        Self {
            device,
            store,
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Station this session belongs to
    #[must_use]
    pub const fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Feed one decoded camera frame.
    ///
    /// Returns as soon as the gate has decided; the handle tracks the
    /// resulting attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`Self::shutdown`].
    pub async fn frame_decoded(
        &self,
        payload: impl Into<String>,
    ) -> Result<EffectHandle, StoreError> {
        self.store
            .send(ScanAction::FrameDecoded {
                payload: payload.into(),
            })
            .await
    }

    /// Submit an operator-typed code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`Self::shutdown`].
    pub async fn submit_manual(
        &self,
        payload: impl Into<String>,
    ) -> Result<EffectHandle, StoreError> {
        self.store
            .send(ScanAction::ManualSubmitted {
                payload: payload.into(),
                request: self.next_request(),
            })
            .await
    }

    /// Submit an operator-typed code and wait for its outcome.
    ///
    /// Returns `None` at once when the in-flight gate discarded the
    /// submission, or after `timeout` if no outcome arrived. The outcome is
    /// matched by request id, so frames decoded meanwhile cannot be mistaken
    /// for it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`Self::shutdown`].
    pub async fn submit_manual_and_wait(
        &self,
        payload: impl Into<String>,
        timeout: Duration,
    ) -> Result<Option<ScanOutcome>, StoreError> {
        let id = self.next_request();
        let result = self
            .store
            .send_and_wait_for(
                ScanAction::ManualSubmitted {
                    payload: payload.into(),
                    request: id,
                },
                |action| {
                    matches!(action, ScanAction::AttemptCompleted { request: Some(r), .. } if *r == id)
                },
                timeout,
            )
            .await;

        match result {
            Ok(ScanAction::AttemptCompleted { outcome, .. }) => Ok(Some(outcome)),
            Ok(_)
            | Err(StoreError::NoEffects | StoreError::Timeout | StoreError::ChannelClosed) => {
                Ok(None)
            },
            Err(error) => Err(error),
        }
    }

    fn next_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drain a decode stream into the gate.
    ///
    /// Frames are fed as fast as the stream yields them; in-flight attempts
    /// are not awaited. Returns the number of frames consumed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the session shuts down
    /// while the stream is still producing.
    pub async fn run_decode_stream<S>(&self, frames: S) -> Result<u64, StoreError>
    where
        S: Stream<Item = String> + Send,
    {
        let mut frames = std::pin::pin!(frames);
        let mut consumed = 0;
        while let Some(frame) = frames.next().await {
            self.frame_decoded(frame).await?;
            consumed += 1;
        }
        tracing::debug!(device = %self.device, consumed, "Decode stream ended");
        Ok(consumed)
    }

    /// Observe attempt completions and cooldown expiries.
    ///
    /// Each action is received after the session state reflects it: once an
    /// `AttemptCompleted` arrives, the gate is already open for the next
    /// payload.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ScanAction> {
        self.store.subscribe_actions()
    }

    /// Copy of the current session state
    pub async fn snapshot(&self) -> ScanSessionState {
        self.store.state(ScanSessionState::clone).await
    }

    /// Current counters
    pub async fn counters(&self) -> IntakeCounters {
        self.store.state(|s| s.counters).await
    }

    /// Attempts and cooldown timers still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.store.pending_effects()
    }

    /// Session health, reported as the `scan_session` component.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let mut check = self.store.health();
        check.component = "scan_session".to_string();
        check.with_metadata("device", self.device.as_str())
    }

    /// Stop accepting input and wait for outstanding attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if attempts are still running
    /// when `timeout` expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}
