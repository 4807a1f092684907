//! Status handler reducer.
//!
//! Drives the `Operate` family from the model's [`Operation`] list: start sets
//! the operation's flag on the target entity, success and error clear it.
//! Flags for different operations on the same entity never touch each other.

use crate::action::EntityAction;
use crate::effect::Effect;
use crate::environment::SyncEnvironment;
use crate::model::{Model, Operation};
use crate::reducer::Reducer;
use crate::state::EntityState;
use smallvec::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Per-entity operation reducer for model `M`.
pub struct StatusReducer<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> StatusReducer<M> {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<M: Model> Default for StatusReducer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for StatusReducer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReducer").finish()
    }
}

impl<M: Model> Reducer for StatusReducer<M> {
    type State = EntityState<M>;
    type Action = EntityAction<M>;
    type Environment = SyncEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            EntityAction::Operate { op, id, params } => {
                state.set_status(op, &id, true);

                let spec = M::operation_spec(op);
                let params = spec.params(&id, params);
                let error_id = id.clone();

                smallvec![crate::request! {
                    env: env,
                    call_id: env.next_call_id(),
                    model: M::MODEL,
                    method: op.verb(),
                    params: params,
                    on_success: |payload| Some(EntityAction::OperationSuccess { op, id, payload }),
                    on_error: |error| Some(EntityAction::OperationError { op, id: error_id, error })
                }]
            },

            EntityAction::OperationStart { op, id } => {
                state.set_status(op, &id, true);
                smallvec![Effect::None]
            },

            EntityAction::OperationSuccess { op, id, payload } => {
                state.set_status(op, &id, false);
                if let Some(on_success) = M::operation_spec(op).on_success {
                    on_success(state, &id, &payload);
                }
                smallvec![Effect::None]
            },

            EntityAction::OperationError { op, id, error } => {
                tracing::debug!(
                    model = M::MODEL,
                    ?id,
                    status = op.status_key(),
                    %error,
                    "Operation failed"
                );
                state.set_status(op, &id, false);
                state.record_error(error);
                smallvec![Effect::None]
            },

            _ => smallvec![Effect::None],
        }
    }
}
