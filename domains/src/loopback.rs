//! In-process server stand-in.
//!
//! [`LoopbackTransport`] queues requests on a channel; [`LoopbackServer`]
//! answers them from in-memory tables through the correlator and publishes
//! a push for every mutation, the way the real server notifies every
//! connected client. Used by the demo binary and the end-to-end tests.

use entity_sync_core::error::{ErrorPayload, TransportError};
use entity_sync_core::model::Model;
use entity_sync_core::transport::{Correlator, Push, PushVerb, Request, Response, Transport};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outbound half: requests go onto a channel the server reads.
#[derive(Debug)]
pub struct LoopbackTransport {
    requests: mpsc::UnboundedSender<Request>,
}

impl LoopbackTransport {
    /// A transport and the receiving end to hand to [`LoopbackServer::serve`].
    #[must_use]
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Request>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { requests }), receiver)
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, request: Request) -> Result<(), TransportError> {
        self.requests
            .send(request)
            .map_err(|_| TransportError::Disconnected)
    }
}

/// What the server does with one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Response frame body
    pub result: Result<Value, ErrorPayload>,
    /// Push announcing the change, for mutations
    pub push: Option<Push>,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            result: Ok(body),
            push: None,
        }
    }

    fn error(message: &str) -> Self {
        Self {
            result: Err(ErrorPayload::from(message)),
            push: None,
        }
    }

    fn announce(mut self, push: Push) -> Self {
        self.push = Some(push);
        self
    }
}

#[derive(Debug)]
struct Table {
    primary_key: &'static str,
    rows: Vec<Value>,
}

impl Table {
    fn position(&self, key: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(self.primary_key) == Some(key))
    }

    fn next_id(&self) -> Value {
        let max = self
            .rows
            .iter()
            .filter_map(|row| row.get(self.primary_key).and_then(Value::as_u64))
            .max()
            .unwrap_or(0);
        json!(max + 1)
    }
}

/// In-memory tables answering the standard entity methods.
///
/// - `list` returns every row whose fields equal the given params
/// - `get`, `set_active` and per-entity operations return the row
/// - `create`, `update`, `delete` mutate and announce the change
/// - requests carrying `pks` are bulk actions, answered with per-entity
///   outcomes
#[derive(Debug, Default)]
pub struct LoopbackServer {
    tables: HashMap<&'static str, Table>,
}

impl LoopbackServer {
    /// A server with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve model `M`, seeded with `items`.
    ///
    /// # Errors
    ///
    /// Returns the serde error if an item does not serialize.
    pub fn with_model<M: Model>(mut self, items: impl IntoIterator<Item = M>) -> Result<Self, serde_json::Error> {
        let rows = items
            .into_iter()
            .map(|item| serde_json::to_value(&item))
            .collect::<Result<Vec<_>, _>>()?;
        self.tables.insert(
            M::MODEL,
            Table {
                primary_key: M::PRIMARY_KEY,
                rows,
            },
        );
        Ok(self)
    }

    /// Answer one request.
    pub fn handle(&mut self, request: &Request) -> Reply {
        let Some(table) = self.tables.get_mut(request.model.as_str()) else {
            return Reply::error("Unknown model");
        };
        let model = request.model.clone();
        let key = request.params.get(table.primary_key).cloned();

        match request.method.as_str() {
            "list" => {
                let rows: Vec<Value> = table
                    .rows
                    .iter()
                    .filter(|row| matches_params(row, &request.params))
                    .cloned()
                    .collect();
                Reply::ok(Value::Array(rows))
            },
            "unsubscribe" => Reply::ok(Value::Null),
            "create" => {
                let Value::Object(mut row) = request.params.clone() else {
                    return Reply::error("Expected an object");
                };
                if !row.contains_key(table.primary_key) {
                    row.insert(table.primary_key.to_string(), table.next_id());
                }
                let row = Value::Object(row);
                table.rows.push(row.clone());
                Reply::ok(row.clone()).announce(Push::new(model, PushVerb::Create, row))
            },
            "update" => {
                let (Some(position), Value::Object(fields)) =
                    (key.as_ref().and_then(|k| table.position(k)), &request.params)
                else {
                    return Reply::error("Not found");
                };
                if let Value::Object(row) = &mut table.rows[position] {
                    row.extend(fields.clone());
                }
                let row = table.rows[position].clone();
                Reply::ok(row.clone()).announce(Push::new(model, PushVerb::Update, row))
            },
            "delete" => match key.as_ref().and_then(|k| table.position(k)) {
                Some(position) => {
                    let removed = table.rows.remove(position);
                    let id = removed.get(table.primary_key).cloned().unwrap_or(Value::Null);
                    let mut payload = Map::new();
                    payload.insert(table.primary_key.to_string(), id);
                    Reply::ok(Value::Null).announce(Push::new(model, PushVerb::Delete, Value::Object(payload)))
                },
                None => Reply::error("Not found"),
            },
            "set_active" if key == Some(Value::Null) => Reply::ok(Value::Null),
            _ => {
                if let Some(Value::Array(pks)) = request.params.get("pks") {
                    return Reply::ok(bulk_outcome(table, pks));
                }
                match key.as_ref().and_then(|k| table.position(k)) {
                    Some(position) => Reply::ok(table.rows[position].clone()),
                    None => Reply::error("Not found"),
                }
            },
        }
    }

    /// Answer requests from `requests` until the transport is dropped.
    pub fn serve(
        mut self,
        correlator: Arc<Correlator>,
        mut requests: mpsc::UnboundedReceiver<Request>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                tracing::debug!(method = %request.qualified_method(), call_id = %request.id, "Loopback request");
                let reply = self.handle(&request);
                correlator.deliver(Response {
                    id: request.id,
                    result: reply.result,
                });
                if let Some(push) = reply.push {
                    correlator.publish(push);
                }
            }
        })
    }
}

fn matches_params(row: &Value, params: &Value) -> bool {
    match params {
        Value::Object(filters) => filters
            .iter()
            .all(|(field, expected)| row.get(field) == Some(expected)),
        _ => true,
    }
}

fn bulk_outcome(table: &Table, pks: &[Value]) -> Value {
    let (found, missing): (Vec<&Value>, Vec<&Value>) =
        pks.iter().partition(|pk| table.position(pk).is_some());
    let mut outcome = json!({
        "success_count": found.len(),
        "failed_ids": missing,
    });
    if !missing.is_empty() {
        outcome["failure_details"] = json!({ "Not found": missing });
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{Pod, Tag};
    use entity_sync_core::correlation::CallId;

    fn server() -> LoopbackServer {
        LoopbackServer::new()
            .with_model(vec![Tag::new(1, "virtual"), Tag::new(2, "gpu")])
            .unwrap()
            .with_model(vec![Pod::new(5, "lxd")])
            .unwrap()
    }

    fn request(model: &str, method: &str, params: Value) -> Request {
        Request::new(CallId::from("call-1"), model, method, params)
    }

    #[test]
    fn lists_filter_by_field_equality() {
        let reply = server().handle(&request("tag", "list", json!({"name": "gpu"})));
        assert_eq!(reply.result.unwrap(), json!([Tag::new(2, "gpu")]));
        assert_eq!(reply.push, None);
    }

    #[test]
    fn mutations_announce_themselves() {
        let mut server = server();

        let created = server.handle(&request("tag", "create", json!({"name": "arm64"})));
        assert_eq!(created.result.unwrap()["id"], json!(3));
        assert_eq!(created.push.unwrap().verb, PushVerb::Create);

        let deleted = server.handle(&request("tag", "delete", json!({"id": 1})));
        let push = deleted.push.unwrap();
        assert_eq!(push.verb, PushVerb::Delete);
        assert_eq!(push.payload, json!({"id": 1}));

        let missing = server.handle(&request("tag", "delete", json!({"id": 1})));
        assert_eq!(missing.result, Err(ErrorPayload::from("Not found")));
    }

    #[test]
    fn bulk_actions_report_missing_entities() {
        let reply = server().handle(&request("tag", "apply", json!({"pks": [1, 9]})));
        assert_eq!(
            reply.result.unwrap(),
            json!({"success_count": 1, "failed_ids": [9], "failure_details": {"Not found": [9]}})
        );
    }

    #[test]
    fn operations_answer_with_the_entity() {
        let reply = server().handle(&request("pod", "refresh", json!({"id": 5})));
        assert_eq!(reply.result.unwrap()["name"], json!("lxd"));
    }
}
