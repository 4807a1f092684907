//! List buckets.
//!
//! Every scoped fetch gets its own bucket, keyed by the call id that issued
//! it. A table and a sidebar widget can each hold a differently filtered,
//! sorted or paginated slice of the same model without overwriting each
//! other.

use crate::error::DecodeError;
use crate::model::Model;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Page position of a paginated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCursor {
    /// 1-based current page
    pub current_page: u32,
    /// Total number of pages
    pub num_pages: u32,
}

impl PageCursor {
    /// Whether another page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.num_pages
    }
}

/// One group of a grouped list, in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListGroup<Id> {
    /// Display label
    pub name: String,
    /// Grouping key value
    pub value: Option<Value>,
    /// Members, in server order
    pub ids: Vec<Id>,
    /// Total members (may exceed `ids.len()` on a partial page)
    pub count: usize,
    /// Whether the group was delivered collapsed
    pub collapsed: bool,
}

/// Decoded body of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPayload<M: Model> {
    /// Entities, in server order
    pub items: Vec<M>,
    /// Groups, if the list was grouped. `Some(vec![])` is a valid result.
    pub groups: Option<Vec<ListGroup<M::Id>>>,
    /// Total matches across all pages
    pub count: Option<usize>,
    /// Page position, if paginated
    pub cursor: Option<PageCursor>,
}

#[derive(Deserialize)]
#[serde(untagged, bound(deserialize = "M: DeserializeOwned"))]
enum WirePayload<M> {
    Flat(Vec<M>),
    Paged(WirePage<M>),
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "M: DeserializeOwned"))]
struct WirePage<M> {
    #[serde(default = "Vec::new")]
    items: Vec<M>,
    groups: Option<Vec<WireGroup<M>>>,
    count: Option<usize>,
    cur_page: Option<u32>,
    num_pages: Option<u32>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "M: DeserializeOwned"))]
struct WireGroup<M> {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default = "Vec::new")]
    items: Vec<M>,
    count: Option<usize>,
    #[serde(default)]
    collapsed: bool,
}

impl<M: Model> ListPayload<M> {
    /// A flat, ungrouped, unpaginated list.
    #[must_use]
    pub fn from_items(items: Vec<M>) -> Self {
        Self {
            count: Some(items.len()),
            items,
            groups: None,
            cursor: None,
        }
    }

    /// Decode a list response.
    ///
    /// Accepts a bare array, or an object with `items` and/or `groups`
    /// plus optional `count`, `cur_page` and `num_pages`. Grouped entities
    /// are flattened into `items` with each group keeping its member ids.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body matches neither shape.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let wire: WirePayload<M> =
            serde_json::from_value(value).map_err(|e| DecodeError::new(M::MODEL, e))?;

        Ok(match wire {
            WirePayload::Flat(items) => Self::from_items(items),
            WirePayload::Paged(page) => {
                let mut items = page.items;
                let groups = page.groups.map(|groups| {
                    groups
                        .into_iter()
                        .map(|group| {
                            let ids: Vec<M::Id> = group.items.iter().map(Model::primary_key).collect();
                            let count = group.count.unwrap_or(ids.len());
                            items.extend(group.items);
                            ListGroup {
                                name: group.name,
                                value: group.value,
                                ids,
                                count,
                                collapsed: group.collapsed,
                            }
                        })
                        .collect()
                });
                let cursor = match (page.cur_page, page.num_pages) {
                    (Some(current_page), Some(num_pages)) => Some(PageCursor {
                        current_page,
                        num_pages,
                    }),
                    _ => None,
                };
                Self {
                    count: page.count.or(Some(items.len())),
                    items,
                    groups,
                    cursor,
                }
            },
        })
    }

    /// The same payload wrapped as grouped results.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<ListGroup<M::Id>>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// The same payload with a page cursor.
    #[must_use]
    pub const fn with_cursor(mut self, cursor: PageCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// An independently loading cached view over one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ListBucket<M: Model> {
    /// Entity copies in server order
    pub items: Vec<M>,
    /// A fetch for this bucket is in flight
    pub loading: bool,
    /// At least one fetch for this bucket completed
    pub loaded: bool,
    /// Marked for refetch; contents still readable
    pub stale: bool,
    /// Groups in server order, if grouped
    pub groups: Option<Vec<ListGroup<M::Id>>>,
    /// Total matches across all pages
    pub count: Option<usize>,
    /// Page position, if paginated
    pub cursor: Option<PageCursor>,
    /// When the last successful fetch landed
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<M: Model> Default for ListBucket<M> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loaded: false,
            stale: false,
            groups: None,
            count: None,
            cursor: None,
            fetched_at: None,
        }
    }
}

impl<M: Model> ListBucket<M> {
    /// Replace the bucket's contents with a fetch result.
    pub fn apply(&mut self, payload: ListPayload<M>, now: DateTime<Utc>) {
        self.items = payload.items;
        self.groups = payload.groups;
        self.count = payload.count;
        self.cursor = payload.cursor;
        self.loading = false;
        self.loaded = true;
        self.stale = false;
        self.fetched_at = Some(now);
    }

    /// Whether the bucket holds a copy of `id`.
    #[must_use]
    pub fn contains(&self, id: &M::Id) -> bool {
        self.items.iter().any(|item| &item.primary_key() == id)
    }

    /// Overwrite the copy with the same id, if held. Returns whether the
    /// bucket changed.
    pub fn replace(&mut self, item: &M) -> bool {
        let id = item.primary_key();
        match self.items.iter_mut().find(|held| held.primary_key() == id) {
            Some(held) if held != item => {
                *held = item.clone();
                true
            },
            _ => false,
        }
    }

    /// Drop the copy of `id` and its group memberships. Returns whether the
    /// bucket changed.
    pub fn remove(&mut self, id: &M::Id) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.primary_key() != id);
        let removed = self.items.len() != before;

        if let Some(groups) = self.groups.as_mut() {
            for group in groups {
                let members = group.ids.len();
                group.ids.retain(|member| member != id);
                if group.ids.len() != members {
                    group.count = group.count.saturating_sub(1);
                }
            }
        }
        if removed {
            self.count = self.count.map(|count| count.saturating_sub(1));
        }
        removed
    }

    /// Whether the fetch completed with zero groups.
    #[must_use]
    pub fn has_no_groups(&self) -> bool {
        self.loaded && self.groups.as_ref().is_some_and(Vec::is_empty)
    }
}
