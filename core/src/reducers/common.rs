//! The standard reducer every entity store needs.

use crate::action::EntityAction;
use crate::bulk::{BulkActionState, BulkOutcome};
use crate::effect::Effect;
use crate::environment::SyncEnvironment;
use crate::error::ErrorPayload;
use crate::list::ListPayload;
use crate::model::Model;
use crate::reducer::Reducer;
use crate::state::EntityState;
use serde_json::{Map, Value, json};
use smallvec::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Fetch / get / set-active / create / update / delete / notify / bulk
/// action / bookkeeping reducer for model `M`.
///
/// Ignores the `Operate` family; see [`super::StatusReducer`].
pub struct CommonReducer<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> CommonReducer<M> {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<M: Model> Default for CommonReducer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for CommonReducer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonReducer").finish()
    }
}

/// Decode an optional entity from a create/update/set-active body.
fn decode_optional<M: Model>(body: Value) -> Result<Option<M>, ErrorPayload> {
    match body {
        Value::Null => Ok(None),
        body => M::decode(body).map(Some).map_err(ErrorPayload::from),
    }
}

/// Params for a bulk action: `{"pks": [...], ..params}`.
fn bulk_params<M: Model>(ids: &[M::Id], params: Value) -> Value {
    let mut map = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("params".to_string(), other);
            map
        },
    };
    map.insert("pks".to_string(), json!(ids));
    Value::Object(map)
}

impl<M: Model> CommonReducer<M> {
    fn fetch_start(state: &mut EntityState<M>, call_id: Option<&crate::correlation::CallId>) {
        match call_id {
            Some(call_id) => {
                let bucket = state.lists.entry(call_id.clone()).or_default();
                bucket.loading = true;
            },
            None => state.loading = true,
        }
        state.touch();
    }
}

impl<M: Model> Reducer for CommonReducer<M> {
    type State = EntityState<M>;
    type Action = EntityAction<M>;
    type Environment = SyncEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ===== Fetch =====
            EntityAction::Fetch { call_id, params } => {
                if let Some(id) = &call_id {
                    let in_flight = state.lists.get(id).is_some_and(|b| b.loading);
                    if in_flight && env.correlator().is_pending(id) {
                        tracing::debug!(model = M::MODEL, call_id = %id, "Fetch already in flight");
                        return smallvec![Effect::None];
                    }
                }

                Self::fetch_start(state, call_id.as_ref());
                let request_id = call_id.clone().unwrap_or_else(|| env.next_call_id());
                let error_call_id = call_id.clone();

                smallvec![crate::request! {
                    env: env,
                    call_id: request_id,
                    model: M::MODEL,
                    method: "list",
                    params: params,
                    on_success: |body| Some(match ListPayload::from_value(body) {
                        Ok(payload) => EntityAction::FetchSuccess { call_id, payload },
                        Err(error) => EntityAction::FetchError { call_id, error: error.into() },
                    }),
                    on_error: |error| Some(EntityAction::FetchError { call_id: error_call_id, error })
                }]
            },

            EntityAction::FetchStart { call_id } => {
                Self::fetch_start(state, call_id.as_ref());
                smallvec![Effect::None]
            },

            EntityAction::FetchSuccess { call_id, payload } => {
                match call_id {
                    Some(call_id) => {
                        let now = env.clock().now();
                        state.apply_bucket(call_id, payload, now);
                    },
                    None => {
                        state.merge(payload.items);
                        state.loading = false;
                        state.loaded = true;
                        state.touch();
                    },
                }
                smallvec![Effect::None]
            },

            EntityAction::FetchError { call_id, error } => {
                tracing::debug!(model = M::MODEL, ?call_id, %error, "Fetch failed");
                match call_id {
                    // A bucket already dropped has nothing left to settle
                    Some(id) => {
                        if let Some(bucket) = state.lists.get_mut(&id) {
                            bucket.loading = false;
                        }
                    },
                    None => state.loading = false,
                }
                state.record_error(error);
                smallvec![Effect::None]
            },

            // ===== Get =====
            EntityAction::Get { call_id, id } => {
                state.loading = true;
                state.touch();

                smallvec![crate::request! {
                    env: env,
                    call_id: call_id.unwrap_or_else(|| env.next_call_id()),
                    model: M::MODEL,
                    method: "get",
                    params: M::id_params(&id),
                    on_success: |body| Some(match M::decode(body) {
                        Ok(item) => EntityAction::GetSuccess { item },
                        Err(error) => EntityAction::GetError { error: error.into() },
                    }),
                    on_error: |error| Some(EntityAction::GetError { error })
                }]
            },

            EntityAction::GetStart => {
                state.loading = true;
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::GetSuccess { item } => {
                state.upsert(item);
                state.loading = false;
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::GetError { error } => {
                state.loading = false;
                state.record_error(error);
                smallvec![Effect::None]
            },

            // ===== Active =====
            EntityAction::SetActive { id } => {
                let params = match &id {
                    Some(id) => M::id_params(id),
                    None => {
                        let mut params = Map::new();
                        params.insert(M::PRIMARY_KEY.to_string(), Value::Null);
                        Value::Object(params)
                    },
                };

                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: "set_active",
                    params: params,
                    on_success: |body| Some(match decode_optional::<M>(body) {
                        Ok(item) => EntityAction::SetActiveSuccess { item },
                        Err(error) => EntityAction::SetActiveError { error },
                    }),
                    on_error: |error| Some(EntityAction::SetActiveError { error })
                }]
            },

            EntityAction::SetActiveSuccess { item } => {
                state.active = item.as_ref().map(Model::primary_key);
                if let Some(item) = item {
                    state.upsert(item);
                }
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::SetActiveError { error } => {
                state.active = None;
                state.record_error(error);
                smallvec![Effect::None]
            },

            // ===== Create / Update =====
            EntityAction::Create { params } => {
                state.begin_save();
                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: "create",
                    params: params,
                    on_success: |body| Some(match decode_optional::<M>(body) {
                        Ok(item) => EntityAction::CreateSuccess { item },
                        Err(error) => EntityAction::CreateError { error },
                    }),
                    on_error: |error| Some(EntityAction::CreateError { error })
                }]
            },

            EntityAction::Update { params } => {
                state.begin_save();
                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: "update",
                    params: params,
                    on_success: |body| Some(match decode_optional::<M>(body) {
                        Ok(item) => EntityAction::UpdateSuccess { item },
                        Err(error) => EntityAction::UpdateError { error },
                    }),
                    on_error: |error| Some(EntityAction::UpdateError { error })
                }]
            },

            EntityAction::CreateStart | EntityAction::UpdateStart | EntityAction::DeleteStart => {
                state.begin_save();
                smallvec![Effect::None]
            },

            EntityAction::CreateSuccess { item } | EntityAction::UpdateSuccess { item } => {
                if let Some(item) = item {
                    state.upsert(item);
                }
                state.finish_save();
                smallvec![Effect::None]
            },

            EntityAction::CreateError { error }
            | EntityAction::UpdateError { error }
            | EntityAction::DeleteError { error } => {
                state.fail_save(error);
                smallvec![Effect::None]
            },

            EntityAction::CreateNotify { item } | EntityAction::UpdateNotify { item } => {
                state.upsert(item);
                smallvec![Effect::None]
            },

            // ===== Delete =====
            EntityAction::Delete { id } => {
                state.begin_save();
                let deleted = id.clone();

                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: "delete",
                    params: M::id_params(&id),
                    on_success: |_body| Some(EntityAction::DeleteSuccess { id: deleted }),
                    on_error: |error| Some(EntityAction::DeleteError { error })
                }]
            },

            EntityAction::DeleteSuccess { id } => {
                state.remove(&id);
                state.finish_save();
                smallvec![Effect::None]
            },

            EntityAction::DeleteNotify { id } => {
                state.remove(&id);
                smallvec![Effect::None]
            },

            // ===== Bulk actions =====
            EntityAction::BulkAction {
                call_id,
                verb,
                ids,
                params,
            } => {
                state.actions.insert(call_id.clone(), BulkActionState::loading());
                state.touch();
                let error_call_id = call_id.clone();

                smallvec![crate::request! {
                    env: env,
                    call_id: call_id.clone(),
                    model: M::MODEL,
                    method: verb,
                    params: bulk_params::<M>(&ids, params),
                    on_success: |body| Some(match BulkOutcome::from_value::<M>(body) {
                        Ok(outcome) => EntityAction::BulkActionSuccess { call_id, outcome },
                        Err(error) => EntityAction::BulkActionError { call_id, error: error.into() },
                    }),
                    on_error: |error| Some(EntityAction::BulkActionError { call_id: error_call_id, error })
                }]
            },

            EntityAction::BulkActionStart { call_id } => {
                state.actions.insert(call_id, BulkActionState::loading());
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::BulkActionSuccess { call_id, outcome } => {
                state
                    .actions
                    .entry(call_id)
                    .or_insert_with(BulkActionState::loading)
                    .succeed(outcome);
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::BulkActionError { call_id, error } => {
                state
                    .actions
                    .entry(call_id)
                    .or_insert_with(BulkActionState::loading)
                    .fail(error);
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::RemoveBulkAction { call_id } => {
                if state.actions.remove(&call_id).is_some() {
                    state.touch();
                }
                smallvec![Effect::None]
            },

            // ===== Subscriptions =====
            EntityAction::Unsubscribe { ids } => {
                if ids.is_empty() {
                    return smallvec![Effect::None];
                }
                let dropped = ids.clone();

                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: "unsubscribe",
                    params: json!({ "pks": ids }),
                    on_success: |_body| Some(EntityAction::UnsubscribeSuccess { ids: dropped }),
                    on_error: |error| Some(EntityAction::UnsubscribeError { error })
                }]
            },

            EntityAction::UnsubscribeSuccess { ids } => {
                for id in &ids {
                    state.remove(id);
                }
                smallvec![Effect::None]
            },

            EntityAction::UnsubscribeError { error } => {
                state.record_error(error);
                smallvec![Effect::None]
            },

            // ===== Bookkeeping =====
            EntityAction::RemoveRequest { call_id } => {
                state.remove_bucket(&call_id);
                smallvec![Effect::None]
            },

            EntityAction::InvalidateLists => {
                for bucket in state.lists.values_mut() {
                    bucket.stale = true;
                }
                state.touch();
                smallvec![Effect::None]
            },

            EntityAction::Cleanup => {
                state.cleanup();
                smallvec![Effect::None]
            },

            EntityAction::Operate { .. }
            | EntityAction::OperationStart { .. }
            | EntityAction::OperationSuccess { .. }
            | EntityAction::OperationError { .. } => smallvec![Effect::None],
        }
    }
}
