//! Spaces: groups of subnets that can reach each other.

use entity_sync_macros::Model;
use serde::{Deserialize, Serialize};

/// A network space.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "space")]
pub struct Space {
    /// Primary key
    pub id: u32,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Member subnets
    #[serde(default)]
    pub subnet_ids: Vec<u32>,
}

impl Space {
    /// An empty space.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            subnet_ids: Vec::new(),
        }
    }
}
