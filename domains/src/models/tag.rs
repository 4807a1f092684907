//! Tags: named labels attached to machines.

use entity_sync_core::selectors::Searchable;
use entity_sync_macros::Model;
use serde::{Deserialize, Serialize};

/// A machine tag.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "tag")]
pub struct Tag {
    /// Primary key
    pub id: u32,
    /// Unique name
    pub name: String,
    /// XPath expression selecting machines automatically, empty for manual tags
    #[serde(default)]
    pub definition: String,
    /// Free-form description
    #[serde(default)]
    pub comment: String,
    /// Kernel options applied to tagged machines
    #[serde(default)]
    pub kernel_opts: Option<String>,
}

impl Tag {
    /// A manual tag with no definition.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            definition: String::new(),
            comment: String::new(),
            kernel_opts: None,
        }
    }

    /// Whether the tag is applied automatically from its definition.
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        !self.definition.is_empty()
    }
}

impl Searchable for Tag {
    fn attribute(&self, key: &str) -> Option<Vec<String>> {
        match key {
            "name" => Some(vec![self.name.clone()]),
            "comment" => Some(vec![self.comment.clone()]),
            "automatic" => Some(vec![self.is_automatic().to_string()]),
            _ => None,
        }
    }

    fn free_text(&self) -> Vec<String> {
        vec![self.name.clone(), self.comment.clone()]
    }
}
