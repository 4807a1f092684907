//! # Entity Sync Testing
//!
//! Testing utilities for entity stores and the runtime around them.
//!
//! This crate provides:
//! - A recording [`MockTransport`](mocks::MockTransport) and a responder
//!   loop standing in for the server
//! - Deterministic call ids and a fixed clock
//! - The [`ReducerTest`] Given/When/Then harness and effect assertions
//! - proptest strategies for the wire-level types
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_testing::{MockTransport, test_environment};
//! use entity_sync_runtime::Store;
//!
//! #[tokio::test]
//! async fn fetch_lands_in_its_bucket() {
//!     let (transport, requests) = MockTransport::channel();
//!     let env = test_environment(transport);
//!     spawn_responder(Arc::clone(env.correlator()), requests, |_| Some(Ok(json!([]))));
//!
//!     let store = Store::new(EntityState::<Tag>::new(), EntityReducer::new(), env);
//!     store.send(EntityAction::Fetch { call_id: Some("call-1".into()), params: json!({}) }).await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use entity_sync_core::correlation::{CallId, CallIdGenerator};
use entity_sync_core::environment::Clock;

pub mod reducer_test;

/// Mock implementations of the environment seams.
pub mod mocks {
    use super::{CallId, CallIdGenerator, Clock, DateTime, Utc};
    use entity_sync_core::error::TransportError;
    use entity_sync_core::transport::{Request, Transport};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::mpsc;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use entity_sync_testing::mocks::FixedClock;
    /// use entity_sync_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Call ids `call-1`, `call-2`, ... in order.
    #[derive(Debug, Default)]
    pub struct SequentialCallIds {
        next: AtomicU64,
    }

    impl SequentialCallIds {
        /// Start at `call-1`.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// Number of ids handed out so far.
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.next.load(Ordering::SeqCst)
        }
    }

    impl CallIdGenerator for SequentialCallIds {
        fn next_id(&self) -> CallId {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            CallId::from(format!("call-{n}"))
        }
    }

    /// Transport that records every request and optionally forwards it to a
    /// channel a test (or [`spawn_responder`](crate::helpers::spawn_responder))
    /// can answer from.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        sent: Mutex<Vec<Request>>,
        outbound: Option<mpsc::UnboundedSender<Request>>,
        refuse: AtomicBool,
    }

    impl MockTransport {
        /// A transport that only records.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A transport that also forwards each request to the returned
        /// receiver.
        #[must_use]
        pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Request>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Self {
                outbound: Some(tx),
                ..Self::default()
            };
            (Arc::new(transport), rx)
        }

        /// Make subsequent sends fail with [`TransportError::Disconnected`].
        pub fn set_refuse(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        /// Every request sent so far, in order.
        #[must_use]
        pub fn requests(&self) -> Vec<Request> {
            self.lock().clone()
        }

        /// The most recent request.
        #[must_use]
        pub fn last_request(&self) -> Option<Request> {
            self.lock().last().cloned()
        }

        /// Requests sent for one `model.method`.
        #[must_use]
        pub fn requests_for(&self, model: &str, method: &str) -> Vec<Request> {
            self.lock()
                .iter()
                .filter(|request| request.model == model && request.method == method)
                .cloned()
                .collect()
        }

        /// Forget recorded requests.
        pub fn clear(&self) {
            self.lock().clear();
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Request>> {
            self.sent.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: Request) -> Result<(), TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Disconnected);
            }
            self.lock().push(request.clone());
            if let Some(outbound) = &self.outbound {
                // Receiver dropped means nobody answers; the call times out
                let _ = outbound.send(request);
            }
            Ok(())
        }
    }
}

/// Test helpers: environment wiring, a server stand-in, tracing.
pub mod helpers {
    use crate::mocks::{SequentialCallIds, test_clock};
    use entity_sync_core::environment::SyncEnvironment;
    use entity_sync_core::error::ErrorPayload;
    use entity_sync_core::reducer::Reducer;
    use entity_sync_core::transport::{Correlator, Request, Response, Transport};
    use entity_sync_runtime::Store;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Environment over `transport` with sequential call ids and the fixed
    /// test clock.
    #[must_use]
    pub fn test_environment(transport: Arc<dyn Transport>) -> SyncEnvironment {
        SyncEnvironment::new(Arc::new(Correlator::new(transport)))
            .with_call_ids(Arc::new(SequentialCallIds::new()))
            .with_clock(Arc::new(test_clock()))
    }

    /// A store over `transport` using [`test_environment`].
    #[must_use]
    pub fn test_store<S, A, R>(
        state: S,
        reducer: R,
        transport: Arc<dyn Transport>,
    ) -> Store<S, A, SyncEnvironment, R>
    where
        R: Reducer<State = S, Action = A, Environment = SyncEnvironment> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
    {
        Store::new(state, reducer, test_environment(transport))
    }

    /// Answer every request arriving on `requests` with whatever `handler`
    /// returns for it. `None` leaves the request unanswered.
    pub fn spawn_responder<F>(
        correlator: Arc<Correlator>,
        mut requests: mpsc::UnboundedReceiver<Request>,
        handler: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&Request) -> Option<Result<Value, ErrorPayload>> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let Some(result) = handler(&request) {
                    correlator.deliver(Response {
                        id: request.id,
                        result,
                    });
                }
            }
        })
    }

    /// Install a test-friendly subscriber once per process.
    ///
    /// Honours `RUST_LOG`; defaults to `warn`.
    pub fn init_test_tracing() {
        use tracing_subscriber::EnvFilter;

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init()
            .ok();
    }
}

/// proptest strategies for wire-level types.
pub mod properties {
    use entity_sync_core::correlation::CallId;
    use entity_sync_core::error::ErrorPayload;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Correlation ids in the `call-N` shape.
    pub fn arb_call_id() -> impl Strategy<Value = CallId> {
        (1u32..10_000).prop_map(|n| CallId::from(format!("call-{n}")))
    }

    /// Names with embedded numbers, the case natural ordering exists for.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[a-z]{1,6}(-[0-9]{1,3})?"
    }

    /// Message or field error payloads.
    pub fn arb_error_payload() -> impl Strategy<Value = ErrorPayload> {
        prop_oneof![
            "[a-zA-Z ]{1,20}".prop_map(ErrorPayload::Message),
            proptest::collection::btree_map("[a-z_]{1,8}", proptest::collection::vec("[a-z ]{1,12}", 1..3), 1..3)
                .prop_map(|fields: BTreeMap<String, Vec<String>>| ErrorPayload::Fields(fields)),
        ]
    }
}

// Re-export commonly used items
pub use helpers::{init_test_tracing, spawn_responder, test_environment, test_store};
pub use mocks::{FixedClock, MockTransport, SequentialCallIds, test_clock};
pub use reducer_test::{ReducerTest, assertions};
