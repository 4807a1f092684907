//! # Entity Sync Core
//!
//! Core traits and types for keeping normalized, per-domain entity stores in
//! sync with a server over a single shared duplex transport.
//!
//! The crate provides the pieces every entity domain needs and nothing
//! domain-specific:
//!
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, including correlated transport calls
//! - **Environment**: Injected correlator, call-id generator and clock
//! - **Model**: A domain entity with its own model name and primary key
//! - **`EntityState`**: The normalized store for one model (items, list
//!   buckets, status records, bulk-action outcomes)
//! - **Reducer generators**: [`reducers::CommonReducer`] and
//!   [`reducers::StatusReducer`], generic over the model
//! - **Selectors**: Pure read views over the normalized items
//!
//! ## Data Flow
//!
//! ```text
//! Binding ──mint CallId──▶ EntityAction::Fetch { call_id }
//!                               │
//!                               ▼
//!                   CommonReducer (FetchStart transition)
//!                               │ Effect::Transport
//!                               ▼
//!              Correlator ──send──▶ Transport ──▶ server
//!                   ▲                               │
//!                   └──────── Response(call_id) ◀───┘
//!                               │
//!                               ▼
//!                   EntityAction::FetchSuccess { call_id }
//!                               │
//!                               ▼
//!                  lists[call_id] ◀── selectors ◀── Binding
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_core::prelude::*;
//!
//! let reducer = EntityReducer::<Tag>::new();
//! let mut state = EntityState::<Tag>::default();
//!
//! reducer.reduce(
//!     &mut state,
//!     EntityAction::FetchSuccess {
//!         call_id: Some(CallId::from("call-1")),
//!         payload: ListPayload::from_items(vec![tag_a, tag_b]),
//!     },
//!     &env,
//! );
//!
//! assert!(state.items.is_empty());
//! assert!(state.lists[&CallId::from("call-1")].loaded);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Entity action enum shared by every domain
pub mod action;

/// Bulk-action outcome tracking (partial failure across many entities)
pub mod bulk;

/// Id-unique entity collection
pub mod collection;

/// Reducer composition utilities
pub mod composition;

/// Correlation ids and their generators
pub mod correlation;

/// Declarative macros for building transport effects
pub mod effect_macros;

/// Error types
pub mod error;

/// List buckets: independent cached views keyed by correlation id
pub mod list;

/// Model and operation traits
pub mod model;

/// Reducer generators
pub mod reducers;

/// Selector layer
pub mod selectors;

/// Normalized per-model state
pub mod state;

/// Per-entity status records
pub mod status;

/// Transport contract and response correlation
pub mod transport;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all state-transition logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for TagReducer {
    ///     type State = EntityState<Tag>;
    ///     type Action = EntityAction<Tag>;
    ///     type Environment = SyncEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut Self::State,
    ///         action: Self::Action,
    ///         env: &Self::Environment,
    ///     ) -> SmallVec<[Effect<Self::Action>; 4]> {
    ///         match action {
    ///             EntityAction::Cleanup => {
    ///                 state.cleanup();
    ///                 smallvec![Effect::None]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Updates state in place
        /// 2. Returns effect descriptions to be executed
        ///
        /// Reducers never fail: malformed input is recorded in state as data.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use crate::error::ErrorPayload;
    use crate::transport::{Correlator, Request};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Callback mapping a successful response into a follow-up action
    pub type OnSuccess<Action> = Box<dyn FnOnce(serde_json::Value) -> Option<Action> + Send>;

    /// Callback mapping a failed response into a follow-up action
    pub type OnError<Action> = Box<dyn FnOnce(ErrorPayload) -> Option<Action> + Send>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// A correlated request over the shared transport
        Transport(TransportOperation<Action>),
    }

    /// A request plus the continuations that turn its response into actions
    pub struct TransportOperation<Action> {
        /// Correlator that owns the pending-call registry
        pub correlator: Arc<Correlator>,
        /// The tagged request to send
        pub request: Request,
        /// How long to wait for the response before reporting a timeout
        pub timeout: Duration,
        /// Called with the response body when the call succeeds
        pub on_success: OnSuccess<Action>,
        /// Called with the error payload when the call fails or times out
        pub on_error: OnError<Action>,
    }

    impl<Action> std::fmt::Debug for TransportOperation<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TransportOperation")
                .field("request", &self.request)
                .field("timeout", &self.timeout)
                .finish_non_exhaustive()
        }
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Transport(op) => f.debug_tuple("Effect::Transport").field(op).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// The request carried by a transport effect, if any
        #[must_use]
        pub const fn request(&self) -> Option<&Request> {
            match self {
                Effect::Transport(op) => Some(&op.request),
                _ => None,
            }
        }

        /// Lift an effect into a larger action type
        ///
        /// Used when a domain reducer runs inside an application reducer: every
        /// follow-up action is wrapped with `embed` before it reaches the store.
        #[must_use]
        pub fn map<B>(self, embed: fn(Action) -> B) -> Effect<B>
        where
            Action: 'static,
            B: 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|e| e.map(embed)).collect())
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(embed) })),
                Effect::Transport(op) => {
                    let TransportOperation {
                        correlator,
                        request,
                        timeout,
                        on_success,
                        on_error,
                    } = op;
                    Effect::Transport(TransportOperation {
                        correlator,
                        request,
                        timeout,
                        on_success: Box::new(move |value| on_success(value).map(embed)),
                        on_error: Box::new(move |error| on_error(error).map(embed)),
                    })
                },
            }
        }
    }
}

/// Environment module - Dependency injection
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use crate::correlation::{CallId, CallIdGenerator, UuidCallIds};
    use crate::transport::Correlator;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Environment shared by every entity reducer
    ///
    /// Holds the correlator (pending-call registry over the shared transport),
    /// the correlation id source and the clock.
    #[derive(Clone)]
    pub struct SyncEnvironment {
        correlator: Arc<Correlator>,
        call_ids: Arc<dyn CallIdGenerator>,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    }

    impl SyncEnvironment {
        /// Default time to wait for a correlated response
        pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

        /// Create an environment with uuid call ids and the system clock
        #[must_use]
        pub fn new(correlator: Arc<Correlator>) -> Self {
            Self {
                correlator,
                call_ids: Arc::new(UuidCallIds),
                clock: Arc::new(SystemClock),
                request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            }
        }

        /// Replace the call id generator
        #[must_use]
        pub fn with_call_ids(mut self, call_ids: Arc<dyn CallIdGenerator>) -> Self {
            self.call_ids = call_ids;
            self
        }

        /// Replace the clock
        #[must_use]
        pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
            self.clock = clock;
            self
        }

        /// Set how long a correlated call may wait for its response
        #[must_use]
        pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
            self.request_timeout = timeout;
            self
        }

        /// The correlator shared by every domain
        #[must_use]
        pub const fn correlator(&self) -> &Arc<Correlator> {
            &self.correlator
        }

        /// Mint a fresh correlation id
        #[must_use]
        pub fn next_call_id(&self) -> CallId {
            self.call_ids.next_id()
        }

        /// The injected clock
        #[must_use]
        pub fn clock(&self) -> &dyn Clock {
            self.clock.as_ref()
        }

        /// Timeout applied to every correlated call
        #[must_use]
        pub const fn request_timeout(&self) -> Duration {
            self.request_timeout
        }
    }

    impl std::fmt::Debug for SyncEnvironment {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SyncEnvironment")
                .field("correlator", &self.correlator)
                .field("request_timeout", &self.request_timeout)
                .finish_non_exhaustive()
        }
    }
}

/// Commonly used items
pub mod prelude {
    pub use crate::action::EntityAction;
    pub use crate::bulk::{BulkActionState, BulkActionStatus, BulkOutcome};
    pub use crate::collection::EntityCollection;
    pub use crate::composition::{Lens, combine_reducers};
    pub use crate::correlation::{CallId, CallIdGenerator};
    pub use crate::effect::Effect;
    pub use crate::environment::{Clock, SyncEnvironment};
    pub use crate::error::ErrorPayload;
    pub use crate::list::{ListBucket, ListGroup, ListPayload, PageCursor};
    pub use crate::model::{Model, NoOperation, Operation, OperationSpec};
    pub use crate::reducer::Reducer;
    pub use crate::reducers::{CommonReducer, EntityReducer, StatusReducer};
    pub use crate::state::EntityState;
    pub use crate::status::StatusRecord;
    pub use crate::transport::{Correlator, Push, PushVerb, Request, Response, Transport};
}
