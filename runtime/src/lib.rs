//! # Gatecheck Runtime
//!
//! Runtime implementation for gatecheck reducers.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Action broadcast**: Observers (UIs, tests) see every action produced by effects
//!
//! ## Example
//!
//! ```ignore
//! use gatecheck_runtime::Store;
//!
//! let store = Store::new(TimerState::default(), TimerReducer, environment);
//!
//! // Send an action; its effects run as spawned tasks
//! store.send(TimerAction::Start).await?;
//!
//! // Read state
//! let running = store.state(|s| s.running).await;
//! ```

use gatecheck_core::{effect::Effect, reducer::Reducer};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Prometheus metrics exporter
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// The reducer started no effects for the action
        ///
        /// Returned by `send_and_wait_for`: nothing can produce a match.
        #[error("Action started no effects")]
        NoEffects,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Health check status levels
///
/// Indicates the current health state of a component or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if status is unhealthy
    #[must_use]
    pub const fn is_unhealthy(self) -> bool {
        matches!(self, Self::Unhealthy)
    }

    /// Get the worst status between two statuses
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Healthy, Self::Healthy) => Self::Healthy,
            _ => Self::Unhealthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Optional metadata (e.g., pending effects, latency)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Handle for tracking the effects started by one action
///
/// Returned by [`Store::send()`]. An action the reducer discarded starts no
/// effects. An `Effect::Future` stays pending until the action it produced
/// has been reduced.
///
/// # Example
///
/// ```ignore
/// let handle = store.send(TimerAction::Start).await?;
/// if handle.started() == 0 {
///     // The reducer discarded the action
/// }
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
}

impl EffectHandle {
    fn new() -> Self {
        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of effects still running for this action
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Number of effects this action started, finished or not
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn track(&self) -> EffectGuard {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.effects.fetch_add(1, Ordering::SeqCst);
        EffectGuard(Arc::clone(&self.effects))
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("started", &self.started())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Internal: decrements the per-action counter on drop, even if the effect
/// panics.
struct EffectGuard(Arc<AtomicUsize>);

impl Drop for EffectGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        ::metrics::gauge!("store.pending_effects").decrement(1.0);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, Duration, Effect, EffectHandle,
        HealthCheck, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;

    /// Default capacity of the action broadcast channel
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Concurrent `send()` calls serialize at the reducer; effects run in
    /// spawned tasks so the caller never waits for them.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Every action produced by an effect is broadcast here once the
        /// reducer has applied it.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new Store with custom action broadcast capacity
        ///
        /// Increase the capacity when many slow observers subscribe.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Number of effects currently running across all actions
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Perform a health check on the Store
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let pending = self.pending_effects();

            let check = if self.shutdown.load(Ordering::Acquire) {
                HealthCheck::unhealthy("store", "Store is shutting down")
            } else {
                HealthCheck::healthy("store")
            };

            check.with_metadata("pending_effects", pending.to_string())
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Rejects new actions, then waits for running effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            ::metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(50);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    ::metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects asynchronously
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            self.apply(action, false).await
        }

        /// Reduce an action and start its effects.
        ///
        /// With `announce`, the action is broadcast after the reducer applied
        /// it and before its own effects start, so an observer that reacts to
        /// it always sees the state it produced. During shutdown the action is
        /// still announced but not reduced.
        async fn apply(&self, action: A, announce: bool) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                ::metrics::counter!("store.shutdown.rejected_actions").increment(1);
                if announce {
                    let _ = self.action_broadcast.send(action);
                }
                return Err(StoreError::ShutdownInProgress);
            }

            ::metrics::counter!("store.commands.total").increment(1);

            let handle = EffectHandle::new();
            let announced = announce.then(|| action.clone());

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                ::metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            if let Some(action) = announced {
                let _ = self.action_broadcast.send(action);
            }

            for effect in effects {
                self.execute_effect_internal(effect, &handle);
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching action produced by its effects
        ///
        /// Subscribes to the action broadcast before sending so the result
        /// cannot be missed. The matching action has been reduced by the time
        /// it is returned.
        ///
        /// # Errors
        ///
        /// - [`StoreError::NoEffects`]: The reducer discarded the action
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            if self.send(action).await?.started() == 0 {
                return Err(StoreError::NoEffects);
            }

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions produced by effects
        ///
        /// Only actions produced by effects are broadcast, not the actions
        /// passed to `send`. Each is received after the reducer applied it.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let running = store.state(|s| s.running).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Feed an effect-produced action back, then broadcast it
        async fn feed_back(&self, action: A)
        where
            R: Clone,
            E: Clone,
        {
            if let Err(error) = self.apply(action, true).await {
                tracing::debug!(%error, "Dropped effect action");
            }
        }

        fn spawn_tracked<F>(&self, handle: &EffectHandle, task: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            let guard = handle.track();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            ::metrics::gauge!("store.pending_effects").increment(1.0);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                task.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Delay`: Waits for duration, then sends action
        fn execute_effect_internal(&self, effect: Effect<A>, handle: &EffectHandle)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    ::metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    ::metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();
                    self.spawn_tracked(handle, async move {
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    ::metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let store = self.clone();
                    self.spawn_tracked(handle, async move {
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

pub use store::Store;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use gatecheck_core::{async_effect, delay, smallvec, SmallVec};

    #[derive(Debug, Clone, Default)]
    struct GateState {
        opened: u32,
        closed: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum GateAction {
        Open,
        Opened,
        CloseLater,
        Closed,
        Ignore,
    }

    #[derive(Clone)]
    struct GateReducer;

    impl Reducer for GateReducer {
        type State = GateState;
        type Action = GateAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut GateState,
            action: GateAction,
            _env: &(),
        ) -> SmallVec<[Effect<GateAction>; 4]> {
            match action {
                GateAction::Open => smallvec![async_effect! { Some(GateAction::Opened) }],
                GateAction::Opened => {
                    state.opened += 1;
                    smallvec![Effect::None]
                },
                GateAction::CloseLater => smallvec![delay! {
                    duration: Duration::from_millis(10),
                    action: GateAction::Closed
                }],
                GateAction::Closed => {
                    state.closed += 1;
                    smallvec![Effect::None]
                },
                GateAction::Ignore => smallvec![],
            }
        }
    }

    fn gate_store() -> Store<GateState, GateAction, (), GateReducer> {
        Store::new(GateState::default(), GateReducer, ())
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = gate_store();

        store
            .send_and_wait_for(
                GateAction::Open,
                |a| matches!(a, GateAction::Opened),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(store.state(|s| s.opened).await, 1);
    }

    #[tokio::test]
    async fn delay_effect_fires_after_duration() {
        let store = gate_store();

        let handle = store.send(GateAction::CloseLater).await.unwrap();
        assert_eq!(handle.started(), 1);
        assert_eq!(handle.pending(), 1);
        assert_eq!(store.state(|s| s.closed).await, 0);

        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.pending() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(store.state(|s| s.closed).await, 1);
    }

    #[tokio::test]
    async fn discarded_action_starts_nothing() {
        let store = gate_store();

        let handle = store.send(GateAction::Ignore).await.unwrap();

        assert_eq!(handle.started(), 0);
        assert_eq!(handle.pending(), 0);
        assert_eq!(store.pending_effects(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn broadcast_actions_are_already_reduced() {
        let store = gate_store();
        let mut rx = store.subscribe_actions();

        for expected in 1..=200 {
            store.send(GateAction::Open).await.unwrap();
            let action = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(action, GateAction::Opened);
            assert_eq!(store.state(|s| s.opened).await, expected);
        }
    }

    #[tokio::test]
    async fn send_and_wait_for_returns_matching_action() {
        let store = gate_store();

        let action = store
            .send_and_wait_for(
                GateAction::Open,
                |a| matches!(a, GateAction::Opened),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(action, GateAction::Opened);
    }

    #[tokio::test]
    async fn send_and_wait_for_times_out_without_result() {
        let store = gate_store();

        let result = store
            .send_and_wait_for(
                GateAction::CloseLater,
                |a| matches!(a, GateAction::Opened),
                Duration::from_millis(5),
            )
            .await;

        assert_eq!(result.unwrap_err(), StoreError::Timeout);
    }

    #[tokio::test]
    async fn send_and_wait_for_returns_at_once_when_nothing_started() {
        let store = gate_store();

        let result = store
            .send_and_wait_for(
                GateAction::Ignore,
                |a| matches!(a, GateAction::Opened),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result.unwrap_err(), StoreError::NoEffects);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = gate_store();

        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send(GateAction::Open).await;
        assert_eq!(result.unwrap_err(), StoreError::ShutdownInProgress);
        assert!(store.health().status.is_unhealthy());
    }

    #[tokio::test]
    async fn results_landing_during_shutdown_are_still_broadcast() {
        let store = gate_store();
        let mut rx = store.subscribe_actions();

        store.send(GateAction::CloseLater).await.unwrap();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), GateAction::Closed);
        assert_eq!(store.state(|s| s.closed).await, 0);
    }

    #[test]
    fn worst_status_wins() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthStatus::Unhealthy.worst(HealthStatus::Healthy),
            HealthStatus::Unhealthy
        );
        assert!(HealthStatus::Healthy.worst(HealthStatus::Healthy).is_healthy());
    }
}
