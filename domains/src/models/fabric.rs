//! Fabrics: sets of connected VLANs.

use entity_sync_macros::Model;
use serde::{Deserialize, Serialize};

/// A network fabric.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "fabric")]
pub struct Fabric {
    /// Primary key
    pub id: u32,
    /// Display name, e.g. `"fabric-0"`
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// VLANs on this fabric
    #[serde(default)]
    pub vlan_ids: Vec<u32>,
    /// The untagged VLAN
    #[serde(default)]
    pub default_vlan_id: Option<u32>,
}

impl Fabric {
    /// A fabric with no VLANs.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            vlan_ids: Vec::new(),
            default_vlan_id: None,
        }
    }
}
