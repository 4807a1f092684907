//! Selector layer.
//!
//! Pure read views over an [`EntityState`]. Nothing here mutates state.
//! Filtering, sorting and grouping work on the canonical `items`, never on a
//! list bucket, so the same logic serves every view. Bucket selectors only
//! expose what a particular fetch returned.

pub mod group;
pub mod join;
pub mod memo;
pub mod natural;
pub mod search;

pub use group::{Group, group_by};
pub use join::{Either, resolve, resolve_either};
pub use memo::Memoized;
pub use natural::{natural_cmp, sort_naturally_by};
pub use search::{FilterItems, FilterValue, Searchable};

use crate::bulk::BulkActionState;
use crate::correlation::CallId;
use crate::error::ErrorPayload;
use crate::list::ListGroup;
use crate::model::Model;
use crate::state::EntityState;

/// Entity by id.
#[must_use]
pub fn get_by_id<'a, M: Model>(state: &'a EntityState<M>, id: &M::Id) -> Option<&'a M> {
    state.items.get(id)
}

/// Entities for a set of ids, in the order given. Unknown ids are skipped;
/// `None` yields an empty list.
#[must_use]
pub fn get_by_ids<'a, M: Model>(state: &'a EntityState<M>, ids: Option<&[M::Id]>) -> Vec<&'a M> {
    ids.unwrap_or_default()
        .iter()
        .filter_map(|id| state.items.get(id))
        .collect()
}

/// Every entity.
#[must_use]
pub fn all<M: Model>(state: &EntityState<M>) -> &[M] {
    state.items.as_slice()
}

/// Entities matching a predicate.
pub fn filter<M: Model>(state: &EntityState<M>, predicate: impl Fn(&M) -> bool) -> Vec<&M> {
    state.items.iter().filter(|&item| predicate(item)).collect()
}

/// Number of entities.
#[must_use]
pub fn count<M: Model>(state: &EntityState<M>) -> usize {
    state.items.len()
}

/// The focused entity, if it is still present.
#[must_use]
pub fn active<M: Model>(state: &EntityState<M>) -> Option<&M> {
    resolve(state, state.active.as_ref())
}

/// Last recorded error.
#[must_use]
pub fn errors<M: Model>(state: &EntityState<M>) -> Option<&ErrorPayload> {
    state.errors.as_ref()
}

/// Entities matching a search filter.
pub fn search<'a, M: Model + Searchable>(state: &'a EntityState<M>, filter: &FilterItems) -> Vec<&'a M> {
    state.items.iter().filter(|item| filter.matches(*item)).collect()
}

/// Entities sorted by a string key in natural order.
pub fn sorted_by<'a, M: Model>(state: &'a EntityState<M>, key: impl Fn(&M) -> &str) -> Vec<&'a M> {
    let mut items: Vec<&M> = state.items.iter().collect();
    items.sort_by(|&a, &b| natural_cmp(key(a), key(b)));
    items
}

/// Entities returned by the fetch issued under `call_id`. `None` until the
/// bucket exists.
#[must_use]
pub fn list_items<'a, M: Model>(state: &'a EntityState<M>, call_id: &CallId) -> Option<&'a [M]> {
    state.lists.get(call_id).map(|bucket| bucket.items.as_slice())
}

/// Groups returned by the fetch issued under `call_id`, in server order.
#[must_use]
pub fn list_groups<'a, M: Model>(
    state: &'a EntityState<M>,
    call_id: &CallId,
) -> Option<&'a [ListGroup<M::Id>]> {
    state
        .lists
        .get(call_id)
        .and_then(|bucket| bucket.groups.as_deref())
}

/// Whether the fetch issued under `call_id` has completed.
#[must_use]
pub fn list_loaded<M: Model>(state: &EntityState<M>, call_id: &CallId) -> bool {
    state.lists.get(call_id).is_some_and(|bucket| bucket.loaded)
}

/// Whether `op` is in flight for `id`.
#[must_use]
pub fn status<M: Model>(state: &EntityState<M>, id: &M::Id, op: M::Operation) -> bool {
    state.statuses.get(id).is_some_and(|record| record.get(op))
}

/// Whether any operation is in flight for `id`.
#[must_use]
pub fn is_processing<M: Model>(state: &EntityState<M>, id: &M::Id) -> bool {
    state.statuses.get(id).is_some_and(|record| record.any())
}

/// Ids with `op` in flight.
#[must_use]
pub fn processing_ids<M: Model>(state: &EntityState<M>, op: M::Operation) -> Vec<M::Id> {
    state
        .items
        .ids()
        .filter(|id| status(state, id, op))
        .collect()
}

/// Outcome of the bulk action issued under `call_id`.
#[must_use]
pub fn bulk_action<'a, M: Model>(
    state: &'a EntityState<M>,
    call_id: &CallId,
) -> Option<&'a BulkActionState<M::Id>> {
    state.actions.get(call_id)
}
