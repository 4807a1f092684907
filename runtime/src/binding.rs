//! Binding hooks.
//!
//! A [`Binding`] is one call site's subscription to a slice of the store: a
//! list view, or one entity's detail. It owns the correlation id it issued,
//! so the lifetime of that id is the lifetime of the binding.
//!
//! ```text
//!        bind(Some(t))                 response reduced
//! Idle ───────────────▶ Requested ─────────────────────▶ Resolved
//!  ▲                       │  bind(Some(t2))                │
//!  │ bind(None)            ▼  (new call id, old forgotten)  │ release() / drop
//!  └──────────────────── TornDown ◀─────────────────────────┘
//! ```
//!
//! Several bindings may watch the same target. The shared
//! [`SubscriptionRegistry`] counts their live call ids per target, and only
//! the last one to let go asks the server to stop pushing.

use crate::StoreError;
use crate::metrics::BindingMetrics;
use crate::store::Store;
use entity_sync_core::action::EntityAction;
use entity_sync_core::composition::Lens;
use entity_sync_core::correlation::CallId;
use entity_sync_core::environment::SyncEnvironment;
use entity_sync_core::list::ListBucket;
use entity_sync_core::model::Model;
use entity_sync_core::reducer::Reducer;
use entity_sync_core::selectors;
use entity_sync_core::state::EntityState;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Where a binding is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    /// No target yet
    Idle,
    /// Request issued, result not in the store yet
    Requested,
    /// Result available through [`Binding::read`]
    Resolved,
    /// Released; nothing is read any more
    TornDown,
}

/// What a binding requests, how it recognises the answer, and how it cleans
/// up. One implementation per kind of view.
pub trait BindingSpec: Send + Sync + 'static {
    /// Store state
    type State: Send + Sync + 'static;
    /// Store action
    type Action: Send + Clone + 'static;
    /// What the binding points at (a query, an entity id)
    type Target: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// What [`Binding::read`] hands back
    type Output;

    /// The request action for `target`, tagged with `call_id`.
    fn request(&self, target: &Self::Target, call_id: &CallId) -> Self::Action;

    /// Whether the result for `call_id` has arrived.
    fn is_resolved(&self, state: &Self::State, target: &Self::Target, call_id: &CallId) -> bool;

    /// Whether the result for `call_id` should be fetched again.
    fn is_stale(&self, _state: &Self::State, _target: &Self::Target, _call_id: &CallId) -> bool {
        false
    }

    /// Read the result.
    fn read(&self, state: &Self::State, target: &Self::Target, call_id: &CallId) -> Option<Self::Output>;

    /// Action dropping this consumer's own slice of state.
    fn remove(&self, _call_id: &CallId) -> Option<Self::Action> {
        None
    }

    /// Action releasing the server-side subscription for `target`. Only sent
    /// once no other live binding holds the target.
    fn unsubscribe(&self, _target: &Self::Target) -> Option<Self::Action> {
        None
    }
}

/// Live call ids per target, shared by every binding of one spec.
#[derive(Debug)]
pub struct SubscriptionRegistry<T> {
    live: Mutex<HashMap<T, HashSet<CallId>>>,
}

impl<T: Eq + Hash> SubscriptionRegistry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Record `call_id` as a consumer of `target`. Returns whether it is the
    /// first one.
    pub fn acquire(&self, target: T, call_id: CallId) -> bool {
        let mut live = self.lock();
        let consumers = live.entry(target).or_default();
        consumers.insert(call_id);
        consumers.len() == 1
    }

    /// Drop `call_id` as a consumer of `target`. Returns whether it was the
    /// last one.
    pub fn release(&self, target: &T, call_id: &CallId) -> bool {
        let mut live = self.lock();
        let Some(consumers) = live.get_mut(target) else {
            return false;
        };
        if !consumers.remove(call_id) {
            return false;
        }
        if consumers.is_empty() {
            live.remove(target);
            return true;
        }
        false
    }

    /// Number of live call ids for `target`.
    #[must_use]
    pub fn consumers(&self, target: &T) -> usize {
        self.lock().get(target).map_or(0, HashSet::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<T, HashSet<CallId>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Eq + Hash> Default for SubscriptionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Subscription<T> {
    target: T,
    call_id: CallId,
}

/// One call site's correlated subscription.
///
/// Dropping a bound binding schedules a best-effort [`release`](Self::release)
/// on the current tokio runtime.
pub struct Binding<R, B>
where
    B: BindingSpec,
    R: Reducer<State = B::State, Action = B::Action, Environment = SyncEnvironment>
        + Send
        + Sync
        + 'static,
{
    store: Store<B::State, B::Action, SyncEnvironment, R>,
    spec: Arc<B>,
    registry: Arc<SubscriptionRegistry<B::Target>>,
    current: Option<Subscription<B::Target>>,
    released: bool,
}

impl<R, B> Binding<R, B>
where
    B: BindingSpec,
    R: Reducer<State = B::State, Action = B::Action, Environment = SyncEnvironment>
        + Send
        + Sync
        + 'static,
{
    /// An idle binding.
    #[must_use]
    pub fn new(
        store: Store<B::State, B::Action, SyncEnvironment, R>,
        spec: Arc<B>,
        registry: Arc<SubscriptionRegistry<B::Target>>,
    ) -> Self {
        Self {
            store,
            spec,
            registry,
            current: None,
            released: false,
        }
    }

    /// The call id currently owned, if bound.
    #[must_use]
    pub fn call_id(&self) -> Option<&CallId> {
        self.current.as_ref().map(|sub| &sub.call_id)
    }

    /// The current target, if bound.
    #[must_use]
    pub fn target(&self) -> Option<&B::Target> {
        self.current.as_ref().map(|sub| &sub.target)
    }

    /// Point the binding at `target`.
    ///
    /// - same target as now: nothing happens
    /// - different target: the old call id is released and its response, if
    ///   it still arrives, is dropped; a new call id is minted and requested
    /// - `None`: the binding releases and goes idle
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    pub async fn bind(&mut self, target: Option<B::Target>) -> Result<BindingPhase, StoreError> {
        if self.target() == target.as_ref() {
            return Ok(self.phase().await);
        }

        self.release().await?;

        let Some(target) = target else {
            self.released = false;
            return Ok(BindingPhase::Idle);
        };

        let call_id = self.store.environment().next_call_id();
        let first = self.registry.acquire(target.clone(), call_id.clone());
        tracing::debug!(%call_id, ?target, first, "Binding issuing request");
        BindingMetrics::record_bind();
        BindingMetrics::record_request();

        let action = self.spec.request(&target, &call_id);
        self.current = Some(Subscription { target, call_id });
        self.released = false;
        self.store.send(action).await?;

        Ok(self.phase().await)
    }

    /// Current lifecycle phase, read from the store.
    pub async fn phase(&self) -> BindingPhase {
        match &self.current {
            None if self.released => BindingPhase::TornDown,
            None => BindingPhase::Idle,
            Some(sub) => {
                let resolved = self
                    .store
                    .state(|state| self.spec.is_resolved(state, &sub.target, &sub.call_id))
                    .await;
                if resolved {
                    BindingPhase::Resolved
                } else {
                    BindingPhase::Requested
                }
            },
        }
    }

    /// The result, once resolved.
    pub async fn read(&self) -> Option<B::Output> {
        let sub = self.current.as_ref()?;
        self.store
            .state(|state| {
                if self.spec.is_resolved(state, &sub.target, &sub.call_id) {
                    self.spec.read(state, &sub.target, &sub.call_id)
                } else {
                    None
                }
            })
            .await
    }

    /// Wait until the result is available and return it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if nothing arrived in time (including when
    ///   the request failed; the failure is in the store's `errors`)
    /// - [`StoreError::ChannelClosed`] if the store went away
    pub async fn resolved(&self, timeout: Duration) -> Result<B::Output, StoreError> {
        let mut actions = self.store.subscribe_actions();

        tokio::time::timeout(timeout, async {
            loop {
                if let Some(output) = self.read().await {
                    return Ok(output);
                }
                match actions.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => return Err(StoreError::ChannelClosed),
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Reissue the request under the same call id if its result went stale
    /// and no request for it is still in flight. Returns whether a request
    /// was sent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    pub async fn refresh_if_stale(&self) -> Result<bool, StoreError> {
        let Some(sub) = &self.current else {
            return Ok(false);
        };
        if self.store.environment().correlator().is_pending(&sub.call_id) {
            return Ok(false);
        }

        let stale = self
            .store
            .state(|state| self.spec.is_stale(state, &sub.target, &sub.call_id))
            .await;
        if !stale {
            return Ok(false);
        }

        tracing::debug!(call_id = %sub.call_id, "Refreshing stale binding");
        BindingMetrics::record_request();
        self.store.send(self.spec.request(&sub.target, &sub.call_id)).await?;
        Ok(true)
    }

    /// Stop reading, drop this consumer's slice, and unsubscribe if no other
    /// binding still holds the target. Safe to call when not bound.
    ///
    /// The in-flight request, if any, is not cancelled on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the cleanup actions
    /// could not be sent. The call id is released regardless.
    pub async fn release(&mut self) -> Result<(), StoreError> {
        let Some(sub) = self.current.take() else {
            return Ok(());
        };
        self.released = true;
        teardown(&self.store, self.spec.as_ref(), &self.registry, sub).await
    }
}

async fn teardown<R, B>(
    store: &Store<B::State, B::Action, SyncEnvironment, R>,
    spec: &B,
    registry: &SubscriptionRegistry<B::Target>,
    sub: Subscription<B::Target>,
) -> Result<(), StoreError>
where
    B: BindingSpec,
    R: Reducer<State = B::State, Action = B::Action, Environment = SyncEnvironment>
        + Send
        + Sync
        + 'static,
{
    store.environment().correlator().forget(&sub.call_id);
    let last = registry.release(&sub.target, &sub.call_id);
    let unsubscribe = if last { spec.unsubscribe(&sub.target) } else { None };

    tracing::debug!(call_id = %sub.call_id, target = ?sub.target, last, "Releasing binding");
    BindingMetrics::record_release(unsubscribe.is_some());

    if let Some(action) = spec.remove(&sub.call_id) {
        store.send(action).await?;
    }
    if let Some(action) = unsubscribe {
        store.send(action).await?;
    }
    Ok(())
}

impl<R, B> Drop for Binding<R, B>
where
    B: BindingSpec,
    R: Reducer<State = B::State, Action = B::Action, Environment = SyncEnvironment>
        + Send
        + Sync
        + 'static,
{
    fn drop(&mut self) {
        let Some(sub) = self.current.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(call_id = %sub.call_id, "Binding dropped outside a runtime, not released");
            return;
        };

        let store = self.store.clone();
        let spec = Arc::clone(&self.spec);
        let registry = Arc::clone(&self.registry);
        runtime.spawn(async move {
            if let Err(error) = teardown(&store, spec.as_ref(), &registry, sub).await {
                tracing::debug!(%error, "Release on drop skipped");
            }
        });
    }
}

impl<R, B> Debug for Binding<R, B>
where
    B: BindingSpec,
    R: Reducer<State = B::State, Action = B::Action, Environment = SyncEnvironment>
        + Send
        + Sync
        + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("target", &self.target())
            .field("call_id", &self.call_id())
            .finish_non_exhaustive()
    }
}

/// Filter / sort / page parameters identifying one list view.
///
/// Two queries are the same target when their parameters serialize to the
/// same JSON.
#[derive(Debug, Clone)]
pub struct ListQuery {
    params: Value,
    key: String,
}

impl ListQuery {
    /// A query with these parameters.
    #[must_use]
    pub fn new(params: Value) -> Self {
        let key = params.to_string();
        Self { params, key }
    }

    /// The parameters sent with the fetch.
    #[must_use]
    pub const fn params(&self) -> &Value {
        &self.params
    }
}

impl PartialEq for ListQuery {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ListQuery {}

impl Hash for ListQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A scoped fetch into `lists[call_id]`. Teardown drops the bucket.
pub struct ListBinding<M: Model, S, A> {
    lens: Lens<S, EntityState<M>, A, EntityAction<M>>,
}

impl<M: Model, S, A> ListBinding<M, S, A> {
    /// List binding over the entity store `lens` focuses on.
    #[must_use]
    pub const fn new(lens: Lens<S, EntityState<M>, A, EntityAction<M>>) -> Self {
        Self { lens }
    }
}

impl<M, S, A> BindingSpec for ListBinding<M, S, A>
where
    M: Model,
    S: Send + Sync + 'static,
    A: Send + Clone + 'static,
{
    type State = S;
    type Action = A;
    type Target = ListQuery;
    type Output = ListBucket<M>;

    fn request(&self, target: &ListQuery, call_id: &CallId) -> A {
        (self.lens.embed)(EntityAction::Fetch {
            call_id: Some(call_id.clone()),
            params: target.params().clone(),
        })
    }

    fn is_resolved(&self, state: &S, _target: &ListQuery, call_id: &CallId) -> bool {
        selectors::list_loaded((self.lens.get)(state), call_id)
    }

    fn is_stale(&self, state: &S, _target: &ListQuery, call_id: &CallId) -> bool {
        (self.lens.get)(state)
            .lists
            .get(call_id)
            .is_some_and(|bucket| bucket.stale && !bucket.loading)
    }

    fn read(&self, state: &S, _target: &ListQuery, call_id: &CallId) -> Option<ListBucket<M>> {
        (self.lens.get)(state).lists.get(call_id).cloned()
    }

    fn remove(&self, call_id: &CallId) -> Option<A> {
        Some((self.lens.embed)(EntityAction::RemoveRequest {
            call_id: call_id.clone(),
        }))
    }
}

/// One entity fetched by id and kept live by server pushes. The last
/// binding to let go unsubscribes, which also drops the entity locally.
pub struct DetailBinding<M: Model, S, A> {
    lens: Lens<S, EntityState<M>, A, EntityAction<M>>,
}

impl<M: Model, S, A> DetailBinding<M, S, A> {
    /// Detail binding over the entity store `lens` focuses on.
    #[must_use]
    pub const fn new(lens: Lens<S, EntityState<M>, A, EntityAction<M>>) -> Self {
        Self { lens }
    }
}

impl<M, S, A> BindingSpec for DetailBinding<M, S, A>
where
    M: Model,
    S: Send + Sync + 'static,
    A: Send + Clone + 'static,
{
    type State = S;
    type Action = A;
    type Target = M::Id;
    type Output = M;

    fn request(&self, target: &M::Id, call_id: &CallId) -> A {
        (self.lens.embed)(EntityAction::Get {
            call_id: Some(call_id.clone()),
            id: target.clone(),
        })
    }

    fn is_resolved(&self, state: &S, target: &M::Id, _call_id: &CallId) -> bool {
        (self.lens.get)(state).items.contains(target)
    }

    fn read(&self, state: &S, target: &M::Id, _call_id: &CallId) -> Option<M> {
        selectors::get_by_id((self.lens.get)(state), target).cloned()
    }

    fn unsubscribe(&self, target: &M::Id) -> Option<A> {
        Some((self.lens.embed)(EntityAction::Unsubscribe {
            ids: vec![target.clone()],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_reports_first_and_last_consumer() {
        let registry = SubscriptionRegistry::<u32>::new();

        assert!(registry.acquire(1, CallId::from("a")));
        assert!(!registry.acquire(1, CallId::from("b")));
        assert_eq!(registry.consumers(&1), 2);

        assert!(!registry.release(&1, &CallId::from("a")));
        assert!(registry.release(&1, &CallId::from("b")));
        assert_eq!(registry.consumers(&1), 0);
    }

    #[test]
    fn releasing_unknown_call_ids_is_not_last() {
        let registry = SubscriptionRegistry::<u32>::new();
        registry.acquire(1, CallId::from("a"));

        assert!(!registry.release(&1, &CallId::from("zzz")));
        assert!(!registry.release(&2, &CallId::from("a")));
        assert_eq!(registry.consumers(&1), 1);
    }

    #[test]
    fn list_queries_compare_by_canonical_params() {
        let a = ListQuery::new(serde_json::json!({"sort": "name", "page": 1}));
        let b = ListQuery::new(serde_json::json!({"page": 1, "sort": "name"}));
        assert_eq!(a, b);
        assert_ne!(a, ListQuery::new(serde_json::json!({"page": 2, "sort": "name"})));
    }
}
