//! Cross-store joins.
//!
//! A foreign key may point into one of several stores (a pod's host is a
//! machine or a controller), or at nothing at all once the target is gone.
//! Joins return `None` for a dangling key instead of failing.

use crate::model::Model;
use crate::state::EntityState;

/// An entity found in one of two stores.
#[derive(Debug, PartialEq)]
pub enum Either<'a, L, R> {
    /// Found in the first store
    Left(&'a L),
    /// Found in the second store
    Right(&'a R),
}

impl<L, R> Clone for Either<'_, L, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L, R> Copy for Either<'_, L, R> {}

impl<'a, L, R> Either<'a, L, R> {
    /// The left entity, if that is where it was found.
    #[must_use]
    pub const fn left(self) -> Option<&'a L> {
        match self {
            Self::Left(l) => Some(l),
            Self::Right(_) => None,
        }
    }

    /// The right entity, if that is where it was found.
    #[must_use]
    pub const fn right(self) -> Option<&'a R> {
        match self {
            Self::Left(_) => None,
            Self::Right(r) => Some(r),
        }
    }
}

/// Follow an optional foreign key into one store.
#[must_use]
pub fn resolve<'a, M: Model>(state: &'a EntityState<M>, id: Option<&M::Id>) -> Option<&'a M> {
    id.and_then(|id| state.items.get(id))
}

/// Follow a foreign key that may point into either of two stores sharing an
/// id type. The first store wins if both match.
#[must_use]
pub fn resolve_either<'a, L, R>(
    left: &'a EntityState<L>,
    right: &'a EntityState<R>,
    id: Option<&L::Id>,
) -> Option<Either<'a, L, R>>
where
    L: Model,
    R: Model<Id = L::Id>,
{
    let id = id?;
    left.items
        .get(id)
        .map(Either::Left)
        .or_else(|| right.items.get(id).map(Either::Right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{Pod, Tag};

    #[test]
    fn resolves_from_whichever_store_has_the_id() {
        let tags = EntityState::with_items(vec![Tag::new(1, "tag")]);
        let pods = EntityState::with_items(vec![Pod::new(2, "pod")]);

        assert_eq!(resolve_either(&tags, &pods, Some(&1)).and_then(Either::left), Some(&Tag::new(1, "tag")));
        assert_eq!(resolve_either(&tags, &pods, Some(&2)).and_then(Either::right), Some(&Pod::new(2, "pod")));
    }

    #[test]
    fn dangling_or_missing_keys_resolve_to_none() {
        let tags = EntityState::with_items(vec![Tag::new(1, "tag")]);
        let pods = EntityState::<Pod>::new();

        assert_eq!(resolve_either(&tags, &pods, Some(&9)), None);
        assert_eq!(resolve_either(&tags, &pods, None), None);
        assert_eq!(resolve(&tags, None), None);
    }
}
