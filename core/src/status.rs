//! Per-entity status records.
//!
//! A status record holds one independent in-flight flag per operation kind.
//! Setting one flag never touches another, so "compose" and "delete" on the
//! same entity can both be in flight and settle independently.

use crate::model::Operation;
use std::collections::{BTreeMap, HashMap};

/// In-flight flags for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord<Op: Operation> {
    flags: HashMap<Op, bool>,
}

impl<Op: Operation> StatusRecord<Op> {
    /// A record with every flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: Op::ALL.iter().map(|&op| (op, false)).collect(),
        }
    }

    /// Whether `op` is in flight.
    #[must_use]
    pub fn get(&self, op: Op) -> bool {
        self.flags.get(&op).copied().unwrap_or(false)
    }

    /// Set one flag.
    pub fn set(&mut self, op: Op, value: bool) {
        self.flags.insert(op, value);
    }

    /// Flag by its status key, e.g. `"composing"`.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<bool> {
        Op::from_status_key(key).map(|op| self.get(op))
    }

    /// Whether any operation is in flight.
    #[must_use]
    pub fn any(&self) -> bool {
        self.flags.values().any(|&v| v)
    }

    /// Flags keyed by status key.
    #[must_use]
    pub fn to_flags(&self) -> BTreeMap<&'static str, bool> {
        Op::ALL.iter().map(|&op| (op.status_key(), self.get(op))).collect()
    }
}

impl<Op: Operation> Default for StatusRecord<Op> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::PodOp;

    #[test]
    fn flags_are_independent() {
        let mut record = StatusRecord::<PodOp>::new();
        assert!(!record.any());

        record.set(PodOp::Compose, true);
        record.set(PodOp::Delete, true);
        record.set(PodOp::Compose, false);

        assert!(!record.get(PodOp::Compose));
        assert!(record.get(PodOp::Delete));
        assert_eq!(record.by_key("deleting"), Some(true));
        assert_eq!(record.by_key("unknown"), None);
        assert_eq!(
            record.to_flags(),
            BTreeMap::from([("composing", false), ("deleting", true), ("refreshing", false)])
        );
    }
}
