//! # Entity Sync Runtime
//!
//! Runtime for entity-sync reducers.
//!
//! This crate provides the Store that owns application state, runs reducers
//! and executes their effects, plus the two long-lived integrations around
//! it: the push pump and the binding hooks.
//!
//! ## Core Components
//!
//! - **Store**: Holds state, runs the reducer, executes effects and feeds
//!   follow-up actions back in
//! - **Transport effects**: Correlated calls awaited through the
//!   [`Correlator`](entity_sync_core::transport::Correlator); the response is
//!   mapped to a `*Success` / `*Error` action
//! - **Push pump** ([`push`]): Decodes unsolicited pushes into `*Notify`
//!   actions
//! - **Bindings** ([`binding`]): Issue, track and tear down one logical
//!   subscription per call site
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_runtime::Store;
//!
//! let store = Store::with_config(AppState::default(), AppReducer::new(), env, &config);
//!
//! store.send(AppAction::Tags(EntityAction::Fetch { call_id: None, params: json!({}) })).await?;
//!
//! let loaded = store.state(|s| s.tags.loaded).await;
//! ```

use entity_sync_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Binding hooks: correlated subscriptions owned by call sites
pub mod binding;

/// Runtime configuration
pub mod config;

/// Prometheus metrics for observability
pub mod metrics;

/// Push pump: unsolicited notifications into store actions
pub mod push;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Domain failures (error frames, timeouts, undecodable bodies) never
    /// show up here: reducers record them in state.
    #[derive(Error, Debug)]
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

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to complete. Follow-up actions fed back by those effects are
/// reduced before the effect counts as done, but their own effects are not
/// tracked.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(action).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // The response for the request issued by `action` has been reduced
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    ///
    /// Useful for initialization in loops where you need a `last_handle`.
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Whether every tracked effect has finished
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.effects.load(Ordering::SeqCst) == 0
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: completion counter shared by the effects of one action
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Keeps the counter right even if the effect task panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use crate::config::SyncConfig;
    use entity_sync_core::effect::TransportOperation;
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (correlator, call ids, clock)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Clones share state, reducer and environment, so a clone can be handed
    /// to a push pump or a binding while the original keeps serving the
    /// caller.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        shutdown_timeout: Duration,
        /// Every action fed back by an effect or a push, published after it
        /// has been reduced.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with the default [`SyncConfig`]
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, &SyncConfig::default())
        }

        /// Create a new Store with custom configuration
        ///
        /// Uses the action broadcast capacity and default shutdown timeout
        /// from `config`. The request timeout belongs to the environment.
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: &SyncConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                shutdown_timeout: config.shutdown_timeout,
                action_broadcast,
            }
        }

        /// The injected environment
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Number of effects still running
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Whether shutdown has begun
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Shut down with the configured default timeout
        ///
        /// # Errors
        ///
        /// See [`shutdown`](Self::shutdown).
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.shutdown_timeout).await
        }

        /// Initiate graceful shutdown of the store
        ///
        /// This method:
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Waits for pending effects to complete (with timeout)
        /// 3. Returns when all effects finish or timeout expires
        ///
        /// In-flight requests are not cancelled on the wire; their responses
        /// are still routed but the follow-up actions are rejected.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Spawns the returned effects
        ///
        /// Returns once the reducer has run, not once effects finish. Use the
        /// returned [`EffectHandle`] to wait for them.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());

                // Note: Precision loss acceptable for metrics (effect counts < 2^52)
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!("store.effects.count").record(effects.len() as f64);

                effects
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            Ok(handle)
        }

        /// Reduce an action fed back by an effect or a push, then publish it
        /// to observers.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub(crate) async fn feed_back(&self, action: A) -> Result<EffectHandle, StoreError>
        {
            let handle = self.send(action.clone()).await?;
            // No receivers is fine
            let _ = self.action_broadcast.send(action);
            Ok(handle)
        }

        /// Send an action and wait for a matching result action
        ///
        /// Designed for request-response use: subscribes to the action
        /// broadcast, sends the initial action, then waits for an action
        /// matching the predicate. Matching actions have already been
        /// reduced when they are returned.
        ///
        /// # Errors
        ///
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
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // If the terminal action was dropped, the timeout catches it
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

        /// Subscribe to all actions fed back into this store
        ///
        /// Receives a clone of every action produced by an effect or a push,
        /// after it has been reduced. Actions passed to [`send`](Self::send)
        /// directly are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let tag_count = store.state(|s| s.tags.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Spawn a task counted by both `tracking` and shutdown.
        fn spawn_tracked<F>(&self, tracking: &EffectTracking, task: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let guard = DecrementGuard(tracking.clone());

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                task.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, feeds back the resulting action if `Some`
        /// - `Parallel`: Executes effects concurrently
        /// - `Transport`: Awaits the correlated response and feeds back the
        ///   mapped action
        ///
        /// Effect tasks that panic are isolated; the guards keep the
        /// counters right.
        #[tracing::instrument(skip(self, effect, tracking), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking)
        {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking);
                    }
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();

                    self.spawn_tracked(tracking, async move {
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action");
                            let _ = store.feed_back(action).await;
                        }
                    });
                },
                Effect::Transport(op) => {
                    metrics::counter!("store.effects.executed", "type" => "transport").increment(1);
                    let store = self.clone();

                    self.spawn_tracked(tracking, async move {
                        if let Some(action) = run_transport(op).await {
                            let _ = store.feed_back(action).await;
                        }
                    });
                },
            }
        }
    }

    /// Await one correlated call and map its outcome to a follow-up action.
    async fn run_transport<A>(op: TransportOperation<A>) -> Option<A> {
        let TransportOperation {
            correlator,
            request,
            timeout,
            on_success,
            on_error,
        } = op;

        let model = request.model.clone();
        let method = request.method.clone();
        let call_id = request.id.clone();
        let start = std::time::Instant::now();

        let outcome = correlator.call(request, timeout).await;
        metrics::histogram!("sync.request.duration_seconds", "model" => model.clone())
            .record(start.elapsed().as_secs_f64());

        match outcome {
            Some(Ok(body)) => {
                tracing::debug!(%call_id, %model, %method, "Call succeeded");
                metrics::counter!("sync.responses.total", "outcome" => "success").increment(1);
                on_success(body)
            },
            Some(Err(error)) => {
                tracing::debug!(%call_id, %model, %method, %error, "Call failed");
                metrics::counter!("sync.responses.total", "outcome" => "error").increment(1);
                on_error(error)
            },
            None => {
                tracing::debug!(%call_id, %model, %method, "Call forgotten, dropping outcome");
                metrics::counter!("sync.responses.total", "outcome" => "forgotten").increment(1);
                None
            },
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                shutdown_timeout: self.shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> std::fmt::Debug for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("pending_effects", &self.pending_effects.load(Ordering::Acquire))
                .field("shutdown", &self.shutdown.load(Ordering::Acquire))
                .finish_non_exhaustive()
        }
    }
}

pub use store::Store;
