//! Subnets.

use entity_sync_macros::Model;
use serde::{Deserialize, Serialize};

/// An IP subnet.
#[derive(Model, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[model(name = "subnet")]
pub struct Subnet {
    /// Primary key
    pub id: u32,
    /// Display name, usually the CIDR
    pub name: String,
    /// Network in CIDR notation
    pub cidr: String,
    /// VLAN the subnet lives on
    #[serde(default)]
    pub vlan: Option<u32>,
    /// Fabric of that VLAN
    #[serde(default)]
    pub fabric: Option<u32>,
    /// Space the subnet belongs to
    #[serde(default)]
    pub space: Option<u32>,
    /// Whether DHCP is managed for this subnet
    #[serde(default)]
    pub managed: bool,
}

impl Subnet {
    /// A subnet named after its CIDR.
    #[must_use]
    pub fn new(id: u32, cidr: impl Into<String>) -> Self {
        let cidr = cidr.into();
        Self {
            id,
            name: cidr.clone(),
            cidr,
            vlan: None,
            fabric: None,
            space: None,
            managed: true,
        }
    }

    /// Place the subnet on a fabric.
    #[must_use]
    pub const fn on_fabric(mut self, fabric: u32) -> Self {
        self.fabric = Some(fabric);
        self
    }

    /// Place the subnet in a space.
    #[must_use]
    pub const fn in_space(mut self, space: u32) -> Self {
        self.space = Some(space);
        self
    }
}
