//! Machines and their lifecycle operations.

use entity_sync_core::model::OperationSpec;
use entity_sync_core::selectors::Searchable;
use entity_sync_macros::{Model, Operation};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Lifecycle operations on a machine. Each has its own in-flight flag, so a
/// machine can be releasing and turning off at once.
#[derive(Operation, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineOperation {
    /// Cancel the running action
    Abort,
    /// Allocate to the current user
    Acquire,
    /// Run commissioning scripts
    Commission,
    /// Install an operating system
    Deploy,
    /// Return to the pool
    Release,
    /// Prevent changes
    Lock,
    /// Allow changes again
    Unlock,
    /// Power on
    #[operation(verb = "on", status = "turningOn")]
    TurnOn,
    /// Power off
    #[operation(verb = "off", status = "turningOff")]
    TurnOff,
    /// Flag as broken
    #[operation(verb = "mark-broken", status = "markingBroken")]
    MarkBroken,
    /// Clear the broken flag
    #[operation(verb = "mark-fixed", status = "markingFixed")]
    MarkFixed,
    /// Remove the machine
    Delete,
}

/// Machine actions other than delete carry their arguments under `extra`.
#[allow(clippy::ptr_arg)] // fixed by PrepareFn
fn action_params(id: &String, params: Value) -> Value {
    let extra = match params {
        Value::Null => json!({}),
        other => other,
    };
    json!({ "system_id": id, "extra": extra })
}

fn machine_specs(op: MachineOperation) -> OperationSpec<Machine> {
    match op {
        MachineOperation::Delete => OperationSpec::default(),
        _ => OperationSpec::default().prepare(action_params),
    }
}

/// A physical or virtual machine.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(
    name = "machine",
    primary_key = "system_id",
    operations = MachineOperation,
    specs = machine_specs
)]
pub struct Machine {
    /// Primary key
    pub system_id: String,
    /// Short host name
    pub hostname: String,
    /// Fully qualified domain name
    #[serde(default)]
    pub fqdn: String,
    /// Lifecycle status, e.g. `"Ready"` or `"Deployed"`
    #[serde(default)]
    pub status: String,
    /// User the machine is allocated to
    #[serde(default)]
    pub owner: Option<String>,
    /// Resource pool
    #[serde(default)]
    pub pool: Option<String>,
    /// Availability zone
    #[serde(default)]
    pub zone: Option<String>,
    /// Applied tags
    #[serde(default)]
    pub tags: Vec<u32>,
    /// VM host the machine was composed on
    #[serde(default)]
    pub pod: Option<u32>,
    /// Whether the machine is locked
    #[serde(default)]
    pub locked: bool,
}

impl Machine {
    /// A ready, unowned machine.
    #[must_use]
    pub fn new(system_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            system_id: system_id.into(),
            fqdn: format!("{hostname}.maas"),
            hostname,
            status: "Ready".to_string(),
            owner: None,
            pool: None,
            zone: None,
            tags: Vec::new(),
            pod: None,
            locked: false,
        }
    }
}

impl Searchable for Machine {
    fn attribute(&self, key: &str) -> Option<Vec<String>> {
        match key {
            "hostname" => Some(vec![self.hostname.clone()]),
            "fqdn" => Some(vec![self.fqdn.clone()]),
            "status" => Some(vec![self.status.clone()]),
            "owner" => Some(self.owner.iter().cloned().collect()),
            "pool" => Some(self.pool.iter().cloned().collect()),
            "zone" => Some(self.zone.iter().cloned().collect()),
            "tags" => Some(self.tags.iter().map(ToString::to_string).collect()),
            "locked" => Some(vec![self.locked.to_string()]),
            _ => None,
        }
    }

    fn free_text(&self) -> Vec<String> {
        vec![self.hostname.clone(), self.fqdn.clone(), self.system_id.clone()]
    }
}
