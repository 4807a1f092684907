//! Bulk-action outcome tracking.
//!
//! An action issued against many entities may succeed for some and fail for
//! others. The outcome keeps which ids failed and why, so a caller can report
//! "failed for K of N" instead of collapsing everything into one message.

use crate::error::{DecodeError, ErrorPayload};
use crate::model::Model;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifecycle of one bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkActionStatus {
    /// Waiting for the server
    Loading,
    /// Every targeted entity succeeded
    Success,
    /// The call failed, or at least one entity failed
    Error,
}

/// Per-entity results reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(bound(deserialize = "Id: DeserializeOwned"))]
pub struct BulkOutcome<Id> {
    /// Entities the action succeeded on
    #[serde(default)]
    pub success_count: usize,
    /// Entities the action failed on
    #[serde(default = "Vec::new", alias = "failed_system_ids")]
    pub failed_ids: Vec<Id>,
    /// Failure reason → ids that failed for that reason
    #[serde(default = "BTreeMap::new")]
    pub failure_details: BTreeMap<String, Vec<Id>>,
}

impl<Id> BulkOutcome<Id> {
    /// An outcome where everything succeeded.
    #[must_use]
    pub const fn succeeded(success_count: usize) -> Self {
        Self {
            success_count,
            failed_ids: Vec::new(),
            failure_details: BTreeMap::new(),
        }
    }

    /// Record a failure.
    #[must_use]
    pub fn with_failure(mut self, id: Id, reason: impl Into<String>) -> Self
    where
        Id: Clone,
    {
        self.failed_ids.push(id.clone());
        self.failure_details.entry(reason.into()).or_default().push(id);
        self
    }
}

impl<Id: DeserializeOwned> BulkOutcome<Id> {
    /// Decode the response body of a bulk action for model `M`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the body does not match.
    pub fn from_value<M: Model<Id = Id>>(value: Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value).map_err(|e| DecodeError::new(M::MODEL, e))
    }
}

/// State of one bulk action, keyed by its call id in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkActionState<Id> {
    /// Lifecycle
    pub status: BulkActionStatus,
    /// Entities the action succeeded on
    pub success_count: usize,
    /// Entities the action failed on
    pub failed_ids: Vec<Id>,
    /// Failure reason → ids
    pub failure_details: BTreeMap<String, Vec<Id>>,
    /// Call-level error, if the whole call failed
    pub errors: Option<ErrorPayload>,
}

impl<Id> BulkActionState<Id> {
    /// A freshly issued action.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            status: BulkActionStatus::Loading,
            success_count: 0,
            failed_ids: Vec::new(),
            failure_details: BTreeMap::new(),
            errors: None,
        }
    }

    /// Record the server's per-entity outcome.
    pub fn succeed(&mut self, outcome: BulkOutcome<Id>) {
        self.status = if outcome.failed_ids.is_empty() {
            BulkActionStatus::Success
        } else {
            BulkActionStatus::Error
        };
        self.success_count = outcome.success_count;
        self.failed_ids = outcome.failed_ids;
        self.failure_details = outcome.failure_details;
        self.errors = None;
    }

    /// Record a call-level failure.
    pub fn fail(&mut self, error: ErrorPayload) {
        self.status = BulkActionStatus::Error;
        self.errors = Some(error);
    }

    /// Number of entities the action failed on.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed_ids.len()
    }

    /// Number of entities the outcome covers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.success_count + self.failed_ids.len()
    }

    /// One-line report, e.g. `"failed for 2 of 5"`.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.status, &self.errors) {
            (BulkActionStatus::Loading, _) => "in progress".to_string(),
            (_, Some(error)) => error.message(),
            (BulkActionStatus::Success, None) => format!("succeeded for {}", self.success_count),
            (BulkActionStatus::Error, None) => {
                format!("failed for {} of {}", self.failed_count(), self.total())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::Tag;
    use serde_json::json;

    #[test]
    fn partial_failures_keep_ids_and_reasons() {
        let outcome = BulkOutcome::<u32>::from_value::<Tag>(json!({
            "success_count": 3,
            "failed_system_ids": [4, 5],
            "failure_details": {"Machine is locked": [4], "No power driver": [5]},
        }));

        let mut state = BulkActionState::loading();
        if let Ok(outcome) = outcome {
            state.succeed(outcome);
        }

        assert_eq!(state.status, BulkActionStatus::Error);
        assert_eq!(state.failed_ids, vec![4, 5]);
        assert_eq!(state.failure_details["Machine is locked"], vec![4]);
        assert_eq!(state.summary(), "failed for 2 of 5");
    }

    #[test]
    fn full_success_is_success() {
        let mut state = BulkActionState::<u32>::loading();
        state.succeed(BulkOutcome::succeeded(4));
        assert_eq!(state.status, BulkActionStatus::Success);
        assert_eq!(state.summary(), "succeeded for 4");
    }

    #[test]
    fn call_level_errors_are_kept_apart_from_entity_failures() {
        let mut state = BulkActionState::<u32>::loading();
        state.fail(ErrorPayload::from("Permission denied"));
        assert_eq!(state.status, BulkActionStatus::Error);
        assert_eq!(state.failed_count(), 0);
        assert_eq!(state.summary(), "Permission denied");
    }
}
