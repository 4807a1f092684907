//! Error types.
//!
//! Two families live here:
//!
//! - [`ErrorPayload`] is *data*: what a domain stores in its `errors` field
//!   when a call fails. It never crosses the store boundary as an `Err`.
//! - [`TransportError`] and [`DecodeError`] are ordinary Rust errors raised
//!   by the transport seam and payload decoding; the reducers convert them
//!   into an [`ErrorPayload`] before they reach state.

use crate::correlation::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field key used by the server for errors that belong to no single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Error payload recorded in an entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPayload {
    /// A plain message
    Message(String),

    /// Field name → messages, as returned by a rejected create/update
    Fields(BTreeMap<String, Vec<String>>),

    /// No response arrived for the call within the request timeout
    Timeout {
        /// The call that went unanswered
        call_id: CallId,
    },

    /// The transport refused or lost the request
    Transport(String),
}

impl ErrorPayload {
    /// Decode an error frame received from the server.
    ///
    /// Strings become [`ErrorPayload::Message`]. Objects whose values are
    /// strings or string lists become [`ErrorPayload::Fields`]. Anything else
    /// is kept as its JSON text.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => Self::Message(message),
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (field, messages) in &map {
                    let messages = match messages {
                        Value::String(message) => vec![message.clone()],
                        Value::Array(items) => {
                            let strings: Option<Vec<String>> = items
                                .iter()
                                .map(|item| item.as_str().map(str::to_string))
                                .collect();
                            match strings {
                                Some(strings) => strings,
                                None => return Self::Message(Value::Object(map).to_string()),
                            }
                        },
                        _ => return Self::Message(Value::Object(map).to_string()),
                    };
                    fields.insert(field.clone(), messages);
                }
                Self::Fields(fields)
            },
            other => Self::Message(other.to_string()),
        }
    }

    /// Messages for one field, if this is a field error.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&[String]> {
        match self {
            Self::Fields(fields) => fields.get(name).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Flatten into a single human-readable line.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Message(message) | Self::Transport(message) => message.clone(),
            Self::Fields(fields) => fields
                .iter()
                .map(|(field, messages)| {
                    if field == NON_FIELD_ERRORS {
                        messages.join(" ")
                    } else {
                        format!("{field}: {}", messages.join(" "))
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
            Self::Timeout { call_id } => format!("no response for request {call_id}"),
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<&str> for ErrorPayload {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

/// Errors raised while handing a request to the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is not open
    #[error("Transport is disconnected")]
    Disconnected,

    /// The request could not be encoded for the wire
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// A request with this call id is already in flight
    #[error("Request {0} is already pending")]
    DuplicateCallId(CallId),
}

impl From<TransportError> for ErrorPayload {
    fn from(error: TransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// A response body did not have the shape the model expects.
#[derive(Error, Debug)]
#[error("Malformed {model} payload: {source}")]
pub struct DecodeError {
    /// Model whose payload failed to decode
    pub model: &'static str,
    /// Underlying serde error
    #[source]
    pub source: serde_json::Error,
}

impl DecodeError {
    /// Wrap a serde error for a model.
    #[must_use]
    pub const fn new(model: &'static str, source: serde_json::Error) -> Self {
        Self { model, source }
    }
}

impl From<DecodeError> for ErrorPayload {
    fn from(error: DecodeError) -> Self {
        Self::Message(error.to_string())
    }
}
