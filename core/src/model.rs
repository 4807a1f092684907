//! Model and operation traits.
//!
//! A [`Model`] is one domain entity type (machine, pod, tag, ...). It names
//! itself on the wire, declares its own primary-key field, and lists the
//! per-entity lifecycle operations whose in-flight state is tracked in the
//! store's status map.

use crate::error::DecodeError;
use crate::state::EntityState;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::hash::Hash;

/// A domain entity synchronized with the server.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Model)]
/// #[model(name = "pod", primary_key = "id", operations = PodOperation)]
/// pub struct Pod {
///     pub id: u32,
///     pub name: String,
/// }
/// ```
pub trait Model:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Primary key type
    type Id: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Per-entity operations tracked in the status map
    type Operation: Operation;

    /// Model name used on the wire
    const MODEL: &'static str;

    /// Name of the primary-key field in the entity's wire form
    const PRIMARY_KEY: &'static str;

    /// This entity's primary key
    fn primary_key(&self) -> Self::Id;

    /// Request shaping and success handling for one operation.
    ///
    /// The default sends `{<primary key>: id, ..params}` and does nothing
    /// extra on success.
    #[must_use]
    fn operation_spec(_op: Self::Operation) -> OperationSpec<Self> {
        OperationSpec::default()
    }

    /// Decode one entity from a response body or push payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the value does not have this model's shape.
    fn decode(value: Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value).map_err(|e| DecodeError::new(Self::MODEL, e))
    }

    /// Decode a primary key.
    ///
    /// Accepts either the bare key or an object carrying the key field, since
    /// delete pushes arrive in both shapes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if neither shape matches.
    fn decode_id(value: Value) -> Result<Self::Id, DecodeError> {
        let value = match value {
            Value::Object(mut map) => map.remove(Self::PRIMARY_KEY).unwrap_or(Value::Object(map)),
            other => other,
        };
        serde_json::from_value(value).map_err(|e| DecodeError::new(Self::MODEL, e))
    }

    /// `{<primary key>: id}`
    #[must_use]
    fn id_params(id: &Self::Id) -> Value {
        let mut params = Map::new();
        params.insert(
            Self::PRIMARY_KEY.to_string(),
            serde_json::to_value(id).unwrap_or(Value::Null),
        );
        Value::Object(params)
    }
}

/// A per-entity lifecycle operation (e.g. "compose", "delete", "refresh").
///
/// Each operation owns one independent flag in the entity's status record.
pub trait Operation: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every operation of this kind, in declaration order
    const ALL: &'static [Self];

    /// Method name sent to the server
    fn verb(self) -> &'static str;

    /// Name of the status flag this operation toggles, e.g. `"composing"`
    fn status_key(self) -> &'static str;

    /// Look an operation up by its status flag name.
    #[must_use]
    fn from_status_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.status_key() == key)
    }
}

/// Operation type for models without per-entity lifecycle operations.
///
/// Uninhabited: such models never create status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoOperation {}

impl Operation for NoOperation {
    const ALL: &'static [Self] = &[];

    fn verb(self) -> &'static str {
        match self {}
    }

    fn status_key(self) -> &'static str {
        match self {}
    }
}

/// Builds operation params from the target id and caller params
pub type PrepareFn<M> = fn(&<M as Model>::Id, Value) -> Value;

/// Extra state change run after an operation succeeds
pub type SuccessFn<M> = fn(&mut EntityState<M>, &<M as Model>::Id, &Value);

/// Overrides for one operation.
pub struct OperationSpec<M: Model> {
    /// Replaces the default params builder
    pub prepare: Option<PrepareFn<M>>,
    /// Runs after the status flag is cleared on success
    pub on_success: Option<SuccessFn<M>>,
}

impl<M: Model> OperationSpec<M> {
    /// Override the params builder.
    #[must_use]
    pub const fn prepare(mut self, prepare: PrepareFn<M>) -> Self {
        self.prepare = Some(prepare);
        self
    }

    /// Add a success hook.
    #[must_use]
    pub const fn on_success(mut self, on_success: SuccessFn<M>) -> Self {
        self.on_success = Some(on_success);
        self
    }

    /// Build the params for a call on `id`.
    #[must_use]
    pub fn params(&self, id: &M::Id, params: Value) -> Value {
        if let Some(prepare) = self.prepare {
            return prepare(id, params);
        }
        match params {
            Value::Null => M::id_params(id),
            Value::Object(mut map) => {
                if !map.contains_key(M::PRIMARY_KEY) {
                    map.insert(
                        M::PRIMARY_KEY.to_string(),
                        serde_json::to_value(id).unwrap_or(Value::Null),
                    );
                }
                Value::Object(map)
            },
            other => other,
        }
    }
}

impl<M: Model> Default for OperationSpec<M> {
    fn default() -> Self {
        Self {
            prepare: None,
            on_success: None,
        }
    }
}

impl<M: Model> Clone for OperationSpec<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Model> Copy for OperationSpec<M> {}

impl<M: Model> Debug for OperationSpec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("prepare", &self.prepare.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{Pod, PodOp, Tag};
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_decode_from_bare_keys_and_objects() {
        assert_eq!(Tag::decode_id(json!(4)).ok(), Some(4));
        assert_eq!(Tag::decode_id(json!({"id": 4, "name": "x"})).ok(), Some(4));
        assert!(Tag::decode_id(json!("four")).is_err());
    }

    #[test]
    fn default_params_carry_the_primary_key() {
        let spec = Pod::operation_spec(PodOp::Compose);
        assert_eq!(spec.params(&3, Value::Null), json!({"id": 3}));
        assert_eq!(
            spec.params(&3, json!({"cores": 2})),
            json!({"id": 3, "cores": 2})
        );
    }

    #[test]
    fn operations_resolve_by_status_key() {
        assert_eq!(PodOp::from_status_key("deleting"), Some(PodOp::Delete));
        assert_eq!(PodOp::from_status_key("powering"), None);
        assert!(NoOperation::ALL.is_empty());
    }
}
