//! Transport contract and response correlation.
//!
//! The whole application shares one duplex connection. Requests go out
//! fire-and-forget through [`Transport::send`]; responses come back in any
//! order, tagged with the [`CallId`] of the request they answer. The
//! [`Correlator`] owns the table of calls still waiting for an answer and
//! routes each response to exactly one waiter.
//!
//! Pushes (unsolicited create/update/delete notifications) carry no call id
//! and are fanned out to every subscriber on a broadcast channel.

use crate::correlation::CallId;
use crate::error::{ErrorPayload, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

/// A tagged request sent over the shared transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id the response will carry back
    pub id: CallId,
    /// Model name, e.g. `"machine"`
    pub model: String,
    /// Method on the model, e.g. `"list"` or `"compose"`
    pub method: String,
    /// Method parameters
    pub params: Value,
}

impl Request {
    /// Build a request.
    #[must_use]
    pub fn new(
        id: CallId,
        model: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            id,
            model: model.into(),
            method: method.into(),
            params,
        }
    }

    /// Wire method name, `"<model>.<method>"`.
    #[must_use]
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.model, self.method)
    }
}

/// One response frame, success or error.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The call this response answers
    pub id: CallId,
    /// Response body, or the error frame decoded into a payload
    pub result: Result<Value, ErrorPayload>,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub const fn success(id: CallId, body: Value) -> Self {
        Self {
            id,
            result: Ok(body),
        }
    }

    /// An error response.
    #[must_use]
    pub const fn error(id: CallId, error: ErrorPayload) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }
}

/// Kind of change announced by a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushVerb {
    /// An entity was created (by any client)
    Create,
    /// An entity changed
    Update,
    /// An entity was removed; the payload is its primary key
    Delete,
}

/// Out-of-band notification not tied to any call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Push {
    /// Model name the push is about
    pub model: String,
    /// What happened
    pub verb: PushVerb,
    /// Entity body, or primary key for deletes
    pub payload: Value,
}

impl Push {
    /// Build a push.
    #[must_use]
    pub fn new(model: impl Into<String>, verb: PushVerb, payload: Value) -> Self {
        Self {
            model: model.into(),
            verb,
            payload,
        }
    }
}

/// Outbound half of the shared duplex connection.
///
/// Sending is fire-and-forget: the answer arrives later through
/// [`Correlator::deliver`]. The transport cannot cancel a request once sent.
pub trait Transport: Send + Sync {
    /// Hand a request to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request could not be queued for
    /// sending. A successful return says nothing about whether the server
    /// will answer.
    fn send(&self, request: Request) -> Result<(), TransportError>;
}

type Waiter = oneshot::Sender<Result<Value, ErrorPayload>>;

/// Pending-call registry over a shared [`Transport`].
///
/// Each call registers a one-shot waiter under its call id before the request
/// leaves. [`Correlator::deliver`] removes the waiter as it routes, so a
/// second response for the same id finds nothing and is dropped.
pub struct Correlator {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<CallId, Waiter>>,
    pushes: broadcast::Sender<Push>,
}

impl Correlator {
    /// Default number of pushes buffered per slow subscriber
    pub const DEFAULT_PUSH_CAPACITY: usize = 256;

    /// Create a correlator over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_push_capacity(transport, Self::DEFAULT_PUSH_CAPACITY)
    }

    /// Create a correlator with a custom push buffer size.
    #[must_use]
    pub fn with_push_capacity(transport: Arc<dyn Transport>, capacity: usize) -> Self {
        let (pushes, _) = broadcast::channel(capacity.max(1));
        Self {
            transport,
            pending: Mutex::new(HashMap::new()),
            pushes,
        }
    }

    /// Send a request and wait for its response.
    ///
    /// Returns:
    /// - `Some(Ok(body))` / `Some(Err(payload))` for the routed response
    /// - `Some(Err(ErrorPayload::Timeout))` if nothing arrived in time
    /// - `Some(Err(ErrorPayload::Transport))` if the send itself failed
    /// - `None` if the call was [forgotten](Self::forget) before it resolved;
    ///   the caller no longer wants the result and should do nothing
    pub async fn call(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Option<Result<Value, ErrorPayload>> {
        let call_id = request.id.clone();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.lock_pending();
            if pending.contains_key(&call_id) {
                tracing::warn!(call_id = %call_id, "Call id already pending, refusing request");
                return Some(Err(TransportError::DuplicateCallId(call_id).into()));
            }
            pending.insert(call_id.clone(), tx);
        }

        tracing::debug!(
            call_id = %call_id,
            method = %request.qualified_method(),
            "Sending correlated request"
        );

        if let Err(error) = self.transport.send(request) {
            tracing::warn!(call_id = %call_id, error = %error, "Transport refused request");
            self.lock_pending().remove(&call_id);
            return Some(Err(error.into()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Some(result),
            // Sender dropped without a value: the call was forgotten
            Ok(Err(_)) => {
                tracing::debug!(call_id = %call_id, "Call forgotten before response");
                None
            },
            Err(_) => {
                tracing::warn!(call_id = %call_id, ?timeout, "Request timed out");
                self.lock_pending().remove(&call_id);
                Some(Err(ErrorPayload::Timeout { call_id }))
            },
        }
    }

    /// Route an incoming response to its waiter.
    ///
    /// Returns `true` if a waiter received it. Responses for unknown,
    /// already-answered or forgotten calls are dropped.
    pub fn deliver(&self, response: Response) -> bool {
        let Response { id, result } = response;
        let waiter = self.lock_pending().remove(&id);

        match waiter {
            Some(tx) => {
                let routed = tx.send(result).is_ok();
                tracing::debug!(call_id = %id, routed, "Routed response");
                routed
            },
            None => {
                tracing::debug!(call_id = %id, "Dropping response with no pending call");
                false
            },
        }
    }

    /// Stop waiting for a call.
    ///
    /// The request is not cancelled on the wire; its response, if it ever
    /// arrives, is dropped by [`deliver`](Self::deliver). Returns whether
    /// the call was still pending.
    pub fn forget(&self, call_id: &CallId) -> bool {
        let removed = self.lock_pending().remove(call_id).is_some();
        if removed {
            tracing::debug!(call_id = %call_id, "Forgot pending call");
        }
        removed
    }

    /// Fan a push out to every subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, push: Push) -> usize {
        tracing::debug!(model = %push.model, verb = ?push.verb, "Publishing push");
        self.pushes.send(push).unwrap_or(0)
    }

    /// Subscribe to pushes.
    #[must_use]
    pub fn subscribe_pushes(&self) -> broadcast::Receiver<Push> {
        self.pushes.subscribe()
    }

    /// Number of calls still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Whether a call is still waiting for a response.
    #[must_use]
    pub fn is_pending(&self, call_id: &CallId) -> bool {
        self.lock_pending().contains_key(call_id)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<CallId, Waiter>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending_count())
            .field("push_subscribers", &self.pushes.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Request>>,
        refuse: bool,
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: Request) -> Result<(), TransportError> {
            if self.refuse {
                return Err(TransportError::Disconnected);
            }
            self.sent.lock().unwrap().push(request);
            Ok(())
        }
    }

    fn request(id: &str) -> Request {
        Request::new(CallId::from(id), "tag", "list", json!({}))
    }

    #[tokio::test]
    async fn responses_route_by_call_id_not_by_order() {
        let correlator = Arc::new(Correlator::new(Arc::new(RecordingTransport::default())));

        let first = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call(request("a"), Duration::from_secs(5)).await }
        });
        let second = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call(request("b"), Duration::from_secs(5)).await }
        });

        while correlator.pending_count() < 2 {
            tokio::task::yield_now().await;
        }

        // Answer out of order
        assert!(correlator.deliver(Response::success(CallId::from("b"), json!("second"))));
        assert!(correlator.deliver(Response::success(CallId::from("a"), json!("first"))));

        assert_eq!(first.await.unwrap(), Some(Ok(json!("first"))));
        assert_eq!(second.await.unwrap(), Some(Ok(json!("second"))));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_responses_are_dropped() {
        let correlator = Arc::new(Correlator::new(Arc::new(RecordingTransport::default())));
        let call = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call(request("a"), Duration::from_secs(5)).await }
        });
        while !correlator.is_pending(&CallId::from("a")) {
            tokio::task::yield_now().await;
        }

        assert!(correlator.deliver(Response::success(CallId::from("a"), json!(1))));
        assert!(!correlator.deliver(Response::success(CallId::from("a"), json!(2))));
        assert_eq!(call.await.unwrap(), Some(Ok(json!(1))));
    }

    #[tokio::test]
    async fn forgotten_calls_resolve_to_nothing() {
        let correlator = Arc::new(Correlator::new(Arc::new(RecordingTransport::default())));
        let call = tokio::spawn({
            let correlator = Arc::clone(&correlator);
            async move { correlator.call(request("a"), Duration::from_secs(5)).await }
        });
        while !correlator.is_pending(&CallId::from("a")) {
            tokio::task::yield_now().await;
        }

        assert!(correlator.forget(&CallId::from("a")));
        assert!(!correlator.deliver(Response::success(CallId::from("a"), json!(1))));
        assert_eq!(call.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_calls_time_out() {
        let correlator = Correlator::new(Arc::new(RecordingTransport::default()));
        let result = correlator.call(request("a"), Duration::from_millis(50)).await;

        assert_eq!(
            result,
            Some(Err(ErrorPayload::Timeout {
                call_id: CallId::from("a")
            }))
        );
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn send_failures_become_transport_errors() {
        let transport = RecordingTransport {
            refuse: true,
            ..RecordingTransport::default()
        };
        let correlator = Correlator::new(Arc::new(transport));
        let result = correlator.call(request("a"), Duration::from_secs(1)).await;

        assert!(matches!(result, Some(Err(ErrorPayload::Transport(_)))));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn pushes_fan_out_to_every_subscriber() {
        let correlator = Correlator::new(Arc::new(RecordingTransport::default()));
        let mut first = correlator.subscribe_pushes();
        let mut second = correlator.subscribe_pushes();

        let delivered = correlator.publish(Push::new("tag", PushVerb::Delete, json!(1)));

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().verb, PushVerb::Delete);
        assert_eq!(second.recv().await.unwrap().payload, json!(1));
    }
}
