//! Correlation ids.
//!
//! A [`CallId`] tags one logical request so that its eventual response (or
//! list bucket) can be matched back to the exact call site that issued it.
//! Ids are opaque: nothing may assume response N belongs to the Nth request.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Generate a new random correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Source of correlation ids.
///
/// Production uses [`UuidCallIds`]; tests inject a deterministic sequence.
pub trait CallIdGenerator: Send + Sync {
    /// Mint an id that has not been handed out before in this session.
    fn next_id(&self) -> CallId;
}

/// Random v4 uuids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCallIds;

impl CallIdGenerator for UuidCallIds {
    fn next_id(&self) -> CallId {
        CallId::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_call_ids_do_not_collide() {
        let ids: HashSet<CallId> = (0..1000).map(|_| UuidCallIds.next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn call_id_serializes_as_plain_string() {
        let id = CallId::from("call-1");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"call-1\"");
        assert_eq!(id.to_string(), "call-1");
    }
}
