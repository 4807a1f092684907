//! VM hosts (pods).

use entity_sync_core::model::{Model, OperationSpec};
use entity_sync_core::state::EntityState;
use entity_sync_macros::{Model, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operations on a VM host.
#[derive(Operation, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodOperation {
    /// Compose a new machine on the host
    Compose,
    /// Remove the host
    Delete,
    /// Re-read the host's resources
    Refresh,
}

/// A refresh answers with the whole updated host.
fn replace_refreshed(state: &mut EntityState<Pod>, id: &u32, payload: &Value) {
    match Pod::decode(payload.clone()) {
        Ok(pod) => {
            state.upsert(pod);
        },
        Err(err) => tracing::warn!(pod = id, error = %err, "Refresh returned an undecodable pod"),
    }
}

fn pod_specs(op: PodOperation) -> OperationSpec<Pod> {
    match op {
        PodOperation::Refresh => OperationSpec::default().on_success(replace_refreshed),
        PodOperation::Compose | PodOperation::Delete => OperationSpec::default(),
    }
}

/// A VM host and its resource usage.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "pod", operations = PodOperation, specs = pod_specs)]
pub struct Pod {
    /// Primary key
    pub id: u32,
    /// Display name
    pub name: String,
    /// Hypervisor, e.g. `"lxd"` or `"virsh"`
    #[serde(rename = "type", default)]
    pub pod_type: String,
    /// System id of the machine or controller running the host
    #[serde(default)]
    pub host: Option<String>,
    /// Total cores
    #[serde(default)]
    pub total_cores: u32,
    /// Cores allocated to composed machines
    #[serde(default)]
    pub used_cores: u32,
    /// Total memory in MiB
    #[serde(default)]
    pub total_memory: u64,
    /// Memory allocated to composed machines in MiB
    #[serde(default)]
    pub used_memory: u64,
}

impl Pod {
    /// An empty LXD host.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            pod_type: "lxd".to_string(),
            host: None,
            total_cores: 0,
            used_cores: 0,
            total_memory: 0,
            used_memory: 0,
        }
    }

    /// Cores still free for composing.
    #[must_use]
    pub const fn free_cores(&self) -> u32 {
        self.total_cores.saturating_sub(self.used_cores)
    }
}
