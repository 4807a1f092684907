//! Id-unique entity collection.

use crate::model::Model;
use std::collections::HashMap;

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new
    Inserted,
    /// An entity with the same id was replaced by a different value
    Replaced,
    /// An identical entity was already present
    Unchanged,
}

impl Upsert {
    /// Whether the collection changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Entities keyed by primary key.
///
/// Lookups go through an id → position index, so nothing depends on an
/// entity staying at a given position. Iteration yields arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection<M: Model> {
    items: Vec<M>,
    index: HashMap<M::Id, usize>,
}

impl<M: Model> Default for EntityCollection<M> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<M: Model> EntityCollection<M> {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entity by id.
    #[must_use]
    pub fn get(&self, id: &M::Id) -> Option<&M> {
        self.index.get(id).and_then(|&pos| self.items.get(pos))
    }

    /// Whether an entity with this id is present.
    #[must_use]
    pub fn contains(&self, id: &M::Id) -> bool {
        self.index.contains_key(id)
    }

    /// Insert, or replace the entity with the same id.
    pub fn upsert(&mut self, item: M) -> Upsert {
        let id = item.primary_key();
        match self.index.get(&id) {
            Some(&pos) => {
                if self.items[pos] == item {
                    Upsert::Unchanged
                } else {
                    self.items[pos] = item;
                    Upsert::Replaced
                }
            },
            None => {
                self.index.insert(id, self.items.len());
                self.items.push(item);
                Upsert::Inserted
            },
        }
    }

    /// Remove by id. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: &M::Id) -> Option<M> {
        let pos = self.index.remove(id)?;
        let removed = self.items.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, M> {
        self.items.iter()
    }

    /// Iterate over ids in arrival order.
    pub fn ids(&self) -> impl Iterator<Item = M::Id> + '_ {
        self.items.iter().map(Model::primary_key)
    }

    /// Borrow as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[M] {
        &self.items
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

impl<M: Model> FromIterator<M> for EntityCollection<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.upsert(item);
        }
        collection
    }
}

impl<'a, M: Model> IntoIterator for &'a EntityCollection<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
