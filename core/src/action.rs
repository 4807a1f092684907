//! Entity actions.
//!
//! One enum per model replaces string-typed `"<model>/<verb>"` routing. Request
//! variants (`Fetch`, `Create`, `Operate`, ...) start a correlated call; the
//! `*Success` / `*Error` variants are fed back by the runtime when the
//! response arrives; the `*Notify` variants come from pushes.

use crate::bulk::BulkOutcome;
use crate::correlation::CallId;
use crate::error::{DecodeError, ErrorPayload};
use crate::list::ListPayload;
use crate::model::Model;
use crate::transport::PushVerb;
use serde_json::Value;

/// Every action an entity store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<M: Model> {
    // ===== Fetch =====
    /// List entities. With a call id the result lands in `lists[call_id]`;
    /// without one it merges into `items`.
    Fetch {
        /// Bucket key, or `None` for an unscoped fetch
        call_id: Option<CallId>,
        /// Filter / sort / page parameters
        params: Value,
    },
    /// A fetch is in flight
    FetchStart {
        /// Bucket key, or `None` for an unscoped fetch
        call_id: Option<CallId>,
    },
    /// A fetch returned
    FetchSuccess {
        /// Bucket key, or `None` for an unscoped fetch
        call_id: Option<CallId>,
        /// Decoded list
        payload: ListPayload<M>,
    },
    /// A fetch failed
    FetchError {
        /// Bucket key, or `None` for an unscoped fetch
        call_id: Option<CallId>,
        /// What went wrong
        error: ErrorPayload,
    },

    // ===== Get =====
    /// Fetch a single entity by id
    Get {
        /// Call to issue the request under; `None` mints a fresh one
        call_id: Option<CallId>,
        /// Entity to fetch
        id: M::Id,
    },
    /// A get is in flight
    GetStart,
    /// A get returned
    GetSuccess {
        /// The fetched entity
        item: M,
    },
    /// A get failed
    GetError {
        /// What went wrong
        error: ErrorPayload,
    },

    // ===== Active =====
    /// Focus an entity (or clear focus with `None`)
    SetActive {
        /// Entity to focus
        id: Option<M::Id>,
    },
    /// The server confirmed the focus change
    SetActiveSuccess {
        /// The focused entity, `None` if focus was cleared
        item: Option<M>,
    },
    /// The focus change failed
    SetActiveError {
        /// What went wrong
        error: ErrorPayload,
    },

    // ===== Create =====
    /// Create an entity
    Create {
        /// Field values
        params: Value,
    },
    /// A create is in flight
    CreateStart,
    /// A create succeeded
    CreateSuccess {
        /// The created entity, if the server returned it
        item: Option<M>,
    },
    /// A create failed
    CreateError {
        /// Field or call error
        error: ErrorPayload,
    },
    /// Pushed: an entity was created by some client
    CreateNotify {
        /// The new entity
        item: M,
    },

    // ===== Update =====
    /// Update an entity
    Update {
        /// Field values, including the primary key
        params: Value,
    },
    /// An update is in flight
    UpdateStart,
    /// An update succeeded
    UpdateSuccess {
        /// The updated entity, if the server returned it
        item: Option<M>,
    },
    /// An update failed
    UpdateError {
        /// Field or call error
        error: ErrorPayload,
    },
    /// Pushed: an entity changed
    UpdateNotify {
        /// The new value
        item: M,
    },

    // ===== Delete =====
    /// Delete an entity
    Delete {
        /// Entity to delete
        id: M::Id,
    },
    /// A delete is in flight
    DeleteStart,
    /// A delete succeeded
    DeleteSuccess {
        /// The deleted entity
        id: M::Id,
    },
    /// A delete failed
    DeleteError {
        /// What went wrong
        error: ErrorPayload,
    },
    /// Pushed: an entity was removed
    DeleteNotify {
        /// The removed entity
        id: M::Id,
    },

    // ===== Per-entity operations =====
    /// Run an operation on one entity
    Operate {
        /// Which operation
        op: M::Operation,
        /// Target entity
        id: M::Id,
        /// Extra parameters
        params: Value,
    },
    /// An operation is in flight
    OperationStart {
        /// Which operation
        op: M::Operation,
        /// Target entity
        id: M::Id,
    },
    /// An operation succeeded
    OperationSuccess {
        /// Which operation
        op: M::Operation,
        /// Target entity
        id: M::Id,
        /// Response body
        payload: Value,
    },
    /// An operation failed
    OperationError {
        /// Which operation
        op: M::Operation,
        /// Target entity
        id: M::Id,
        /// What went wrong
        error: ErrorPayload,
    },

    // ===== Bulk actions =====
    /// Run an action against many entities at once
    BulkAction {
        /// Key for the outcome in `actions`
        call_id: CallId,
        /// Server-side action name
        verb: String,
        /// Targets
        ids: Vec<M::Id>,
        /// Extra parameters
        params: Value,
    },
    /// A bulk action is in flight
    BulkActionStart {
        /// Outcome key
        call_id: CallId,
    },
    /// A bulk action returned (possibly with per-entity failures)
    BulkActionSuccess {
        /// Outcome key
        call_id: CallId,
        /// Per-entity results
        outcome: BulkOutcome<M::Id>,
    },
    /// A bulk action failed as a whole
    BulkActionError {
        /// Outcome key
        call_id: CallId,
        /// What went wrong
        error: ErrorPayload,
    },
    /// Drop a bulk-action outcome
    RemoveBulkAction {
        /// Outcome key
        call_id: CallId,
    },

    // ===== Subscriptions =====
    /// Ask the server to stop pushing updates for these entities
    Unsubscribe {
        /// Entities no binding needs any more
        ids: Vec<M::Id>,
    },
    /// The server stopped pushing for these entities
    UnsubscribeSuccess {
        /// Entities to drop locally
        ids: Vec<M::Id>,
    },
    /// The unsubscribe failed
    UnsubscribeError {
        /// What went wrong
        error: ErrorPayload,
    },

    // ===== Bookkeeping =====
    /// Drop a list bucket. Safe on a missing bucket.
    RemoveRequest {
        /// Bucket key
        call_id: CallId,
    },
    /// Mark every list bucket stale
    InvalidateLists,
    /// Clear `errors` and the save flags
    Cleanup,
}

impl<M: Model> EntityAction<M> {
    /// Decode a push into its `*Notify` action.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the payload does not match the model.
    pub fn from_push(verb: PushVerb, payload: Value) -> Result<Self, DecodeError> {
        Ok(match verb {
            PushVerb::Create => Self::CreateNotify {
                item: M::decode(payload)?,
            },
            PushVerb::Update => Self::UpdateNotify {
                item: M::decode(payload)?,
            },
            PushVerb::Delete => Self::DeleteNotify {
                id: M::decode_id(payload)?,
            },
        })
    }

    /// Whether this action starts a call on the transport.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::Get { .. }
                | Self::SetActive { .. }
                | Self::Create { .. }
                | Self::Update { .. }
                | Self::Delete { .. }
                | Self::Operate { .. }
                | Self::BulkAction { .. }
                | Self::Unsubscribe { .. }
        )
    }

    /// Short name for logs and metrics, e.g. `"fetch_success"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::FetchStart { .. } => "fetch_start",
            Self::FetchSuccess { .. } => "fetch_success",
            Self::FetchError { .. } => "fetch_error",
            Self::Get { .. } => "get",
            Self::GetStart => "get_start",
            Self::GetSuccess { .. } => "get_success",
            Self::GetError { .. } => "get_error",
            Self::SetActive { .. } => "set_active",
            Self::SetActiveSuccess { .. } => "set_active_success",
            Self::SetActiveError { .. } => "set_active_error",
            Self::Create { .. } => "create",
            Self::CreateStart => "create_start",
            Self::CreateSuccess { .. } => "create_success",
            Self::CreateError { .. } => "create_error",
            Self::CreateNotify { .. } => "create_notify",
            Self::Update { .. } => "update",
            Self::UpdateStart => "update_start",
            Self::UpdateSuccess { .. } => "update_success",
            Self::UpdateError { .. } => "update_error",
            Self::UpdateNotify { .. } => "update_notify",
            Self::Delete { .. } => "delete",
            Self::DeleteStart => "delete_start",
            Self::DeleteSuccess { .. } => "delete_success",
            Self::DeleteError { .. } => "delete_error",
            Self::DeleteNotify { .. } => "delete_notify",
            Self::Operate { .. } => "operate",
            Self::OperationStart { .. } => "operation_start",
            Self::OperationSuccess { .. } => "operation_success",
            Self::OperationError { .. } => "operation_error",
            Self::BulkAction { .. } => "bulk_action",
            Self::BulkActionStart { .. } => "bulk_action_start",
            Self::BulkActionSuccess { .. } => "bulk_action_success",
            Self::BulkActionError { .. } => "bulk_action_error",
            Self::RemoveBulkAction { .. } => "remove_bulk_action",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::UnsubscribeSuccess { .. } => "unsubscribe_success",
            Self::UnsubscribeError { .. } => "unsubscribe_error",
            Self::RemoveRequest { .. } => "remove_request",
            Self::InvalidateLists => "invalidate_lists",
            Self::Cleanup => "cleanup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::Tag;
    use serde_json::json;

    #[test]
    fn pushes_decode_into_notify_actions() {
        let created = EntityAction::<Tag>::from_push(PushVerb::Create, json!({"id": 1, "name": "a"}));
        assert_eq!(
            created.ok(),
            Some(EntityAction::CreateNotify {
                item: Tag::new(1, "a")
            })
        );

        let deleted = EntityAction::<Tag>::from_push(PushVerb::Delete, json!(1));
        assert_eq!(deleted.ok(), Some(EntityAction::DeleteNotify { id: 1 }));
    }

    #[test]
    fn undecodable_pushes_are_errors() {
        assert!(EntityAction::<Tag>::from_push(PushVerb::Update, json!({"id": "x"})).is_err());
    }

    #[test]
    fn request_actions_are_flagged() {
        assert!(
            EntityAction::<Tag>::Fetch {
                call_id: None,
                params: json!({})
            }
            .is_request()
        );
        assert!(!EntityAction::<Tag>::Cleanup.is_request());
        assert_eq!(EntityAction::<Tag>::InvalidateLists.name(), "invalidate_lists");
    }
}
