//! Region and rack controllers.

use entity_sync_macros::Model;
use serde::{Deserialize, Serialize};

/// A region or rack controller. Controllers can host VMs, so a pod's host
/// is either a machine or a controller.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "controller", primary_key = "system_id")]
pub struct Controller {
    /// Primary key
    pub system_id: String,
    /// Short host name
    pub hostname: String,
    /// e.g. `"Region and rack controller"`
    #[serde(default)]
    pub node_type_display: String,
    /// Installed software version
    #[serde(default)]
    pub version: Option<String>,
}

impl Controller {
    /// A region and rack controller.
    #[must_use]
    pub fn new(system_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            hostname: hostname.into(),
            node_type_display: "Region and rack controller".to_string(),
            version: None,
        }
    }
}
