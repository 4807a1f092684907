//! Normalized per-model state.
//!
//! One [`EntityState`] per model. All mutation goes through the reducers;
//! the helpers here keep the cross-field invariants in one place:
//!
//! - a status record exists exactly for the ids held in `items` or in any
//!   list bucket (models without operations never get one)
//! - every canonical write is copied into the list buckets that already
//!   hold that id, and every removal drops it from them

use crate::bulk::BulkActionState;
use crate::collection::{EntityCollection, Upsert};
use crate::correlation::CallId;
use crate::error::ErrorPayload;
use crate::list::{ListBucket, ListPayload};
use crate::model::{Model, Operation};
use crate::status::StatusRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The store for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<M: Model> {
    /// Canonical entities
    pub items: EntityCollection<M>,
    /// An unscoped fetch is in flight
    pub loading: bool,
    /// An unscoped fetch has completed at least once
    pub loaded: bool,
    /// A create/update/delete is in flight
    pub saving: bool,
    /// The last create/update/delete succeeded
    pub saved: bool,
    /// Last error; cleared by `Cleanup`
    pub errors: Option<ErrorPayload>,
    /// Scoped fetch results by call id
    pub lists: HashMap<CallId, ListBucket<M>>,
    /// Currently focused entity
    pub active: Option<M::Id>,
    /// In-flight operation flags by entity id
    pub statuses: HashMap<M::Id, StatusRecord<M::Operation>>,
    /// Bulk-action outcomes by call id
    pub actions: HashMap<CallId, BulkActionState<M::Id>>,
    /// Bumped on every change; memoized selectors key on it
    pub revision: u64,
}

impl<M: Model> Default for EntityState<M> {
    fn default() -> Self {
        Self {
            items: EntityCollection::new(),
            loading: false,
            loaded: false,
            saving: false,
            saved: false,
            errors: None,
            lists: HashMap::new(),
            active: None,
            statuses: HashMap::new(),
            actions: HashMap::new(),
            revision: 0,
        }
    }
}

impl<M: Model> EntityState<M> {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with entities, as if an unscoped fetch completed.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = M>) -> Self {
        let mut state = Self::new();
        state.merge(items);
        state.loaded = true;
        state
    }

    /// Record a change.
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Insert or replace one entity. Returns whether anything changed.
    pub fn upsert(&mut self, item: M) -> bool {
        let id = item.primary_key();
        let mut changed = false;

        for bucket in self.lists.values_mut() {
            changed |= bucket.replace(&item);
        }

        let outcome = self.items.upsert(item);
        if outcome == Upsert::Inserted && !M::Operation::ALL.is_empty() {
            self.statuses.entry(id).or_default();
        }
        changed |= outcome.changed();

        if changed {
            self.touch();
        }
        changed
    }

    /// Upsert many entities. Returns whether anything changed.
    pub fn merge(&mut self, items: impl IntoIterator<Item = M>) -> bool {
        items
            .into_iter()
            .fold(false, |changed, item| self.upsert(item) | changed)
    }

    /// Fill the bucket for `call_id` with a scoped fetch result, tracking
    /// status for every id it now holds and releasing ids it no longer does.
    pub fn apply_bucket(&mut self, call_id: CallId, payload: ListPayload<M>, now: DateTime<Utc>) {
        let bucket = self.lists.entry(call_id).or_default();
        let previous: Vec<M::Id> = bucket.items.iter().map(Model::primary_key).collect();
        bucket.apply(payload, now);
        let current: Vec<M::Id> = bucket.items.iter().map(Model::primary_key).collect();

        if !M::Operation::ALL.is_empty() {
            for id in &current {
                self.statuses.entry(id.clone()).or_default();
            }
        }
        for id in previous.iter().filter(|id| !current.contains(id)) {
            self.release_status(id);
        }
        self.touch();
    }

    /// Drop the bucket for `call_id` along with status records no longer
    /// held anywhere. Returns whether anything changed.
    pub fn remove_bucket(&mut self, call_id: &CallId) -> bool {
        let Some(bucket) = self.lists.remove(call_id) else {
            return false;
        };
        for item in &bucket.items {
            self.release_status(&item.primary_key());
        }
        self.touch();
        true
    }

    /// Whether `id` is in `items` or any bucket.
    #[must_use]
    pub fn holds(&self, id: &M::Id) -> bool {
        self.items.contains(id) || self.lists.values().any(|bucket| bucket.contains(id))
    }

    fn release_status(&mut self, id: &M::Id) {
        if !self.holds(id) {
            self.statuses.remove(id);
        }
    }

    /// Remove an entity with its status record and bucket copies.
    ///
    /// Removing an absent id is a no-op. Returns whether anything changed.
    pub fn remove(&mut self, id: &M::Id) -> bool {
        let mut changed = self.items.remove(id).is_some();
        changed |= self.statuses.remove(id).is_some();
        for bucket in self.lists.values_mut() {
            changed |= bucket.remove(id);
        }

        if changed {
            self.touch();
        }
        changed
    }

    /// Set one operation flag. Ignored for ids without a status record.
    pub fn set_status(&mut self, op: M::Operation, id: &M::Id, value: bool) -> bool {
        match self.statuses.get_mut(id) {
            Some(record) => {
                record.set(op, value);
                self.touch();
                true
            },
            None => {
                tracing::debug!(model = M::MODEL, ?id, ?op, "No status record for entity");
                false
            },
        }
    }

    /// `{saving: true, saved: false}`
    pub fn begin_save(&mut self) {
        self.saving = true;
        self.saved = false;
        self.touch();
    }

    /// `{saving: false, saved: true}`, clearing the previous error.
    pub fn finish_save(&mut self) {
        self.saving = false;
        self.saved = true;
        self.errors = None;
        self.touch();
    }

    /// Record a failed mutation.
    pub fn fail_save(&mut self, error: ErrorPayload) {
        self.saving = false;
        self.saved = false;
        self.errors = Some(error);
        self.touch();
    }

    /// Record an error without touching any in-flight flag.
    pub fn record_error(&mut self, error: ErrorPayload) {
        self.errors = Some(error);
        self.touch();
    }

    /// Clear `errors` and the save flags so a form can be reopened clean.
    pub fn cleanup(&mut self) {
        self.errors = None;
        self.saving = false;
        self.saved = false;
        self.touch();
    }
}
