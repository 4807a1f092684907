//! Reducer generators.
//!
//! Given a [`Model`] (its model name and primary-key field), these produce the
//! standard reducer set every entity store needs:
//!
//! - [`CommonReducer`]: fetch, get, set-active, create, update, delete, the
//!   push-driven `*Notify` variants, bulk actions, unsubscribe and
//!   bookkeeping
//! - [`StatusReducer`]: the per-entity operation family driven by
//!   [`Model::Operation`](crate::model::Model::Operation)
//! - [`EntityReducer`]: both combined; what a domain normally uses

mod common;
mod status;

pub use common::CommonReducer;
pub use status::StatusReducer;

use crate::action::EntityAction;
use crate::composition::{CombinedReducer, combine_reducers};
use crate::effect::Effect;
use crate::environment::SyncEnvironment;
use crate::model::Model;
use crate::reducer::Reducer;
use crate::state::EntityState;
use smallvec::SmallVec;

/// Common and status reducers for model `M`, run in that order.
pub struct EntityReducer<M: Model> {
    inner: CombinedReducer<EntityState<M>, EntityAction<M>, SyncEnvironment>,
}

impl<M: Model> EntityReducer<M> {
    /// Create the reducer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: combine_reducers(vec![
                Box::new(CommonReducer::<M>::new()),
                Box::new(StatusReducer::<M>::new()),
            ]),
        }
    }
}

impl<M: Model> Default for EntityReducer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> std::fmt::Debug for EntityReducer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityReducer")
            .field("model", &M::MODEL)
            .finish()
    }
}

impl<M: Model> Reducer for EntityReducer<M> {
    type State = EntityState<M>;
    type Action = EntityAction<M>;
    type Environment = SyncEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        tracing::trace!(model = M::MODEL, action = action.name(), "Reducing entity action");
        self.inner.reduce(state, action, env)
    }
}
