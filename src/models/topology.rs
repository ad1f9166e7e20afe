use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Kind;

/// Role a device plays inside a topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Spine,
    Leaf,
    RouteReflector,
    PeRouter,
    PRouter,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Spine => "spine",
            DeviceRole::Leaf => "leaf",
            DeviceRole::RouteReflector => "route_reflector",
            DeviceRole::PeRouter => "pe_router",
            DeviceRole::PRouter => "p_router",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Underlay {
    Ebgp,
    Ospf,
    Isis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    Ebgp,
    Ibgp,
}

/// Underlay/overlay routing pairing for a topology (e.g. eBGP/EVPN)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub underlay: Underlay,
    pub overlay: Overlay,
}

impl_node!(Strategy, Kind::Strategy, |n| n.name.clone());

impl Strategy {
    /// Per-device ASNs are generated as soon as either layer runs eBGP
    pub fn uses_ebgp(&self) -> bool {
        self.underlay == Underlay::Ebgp || self.overlay == Overlay::Ebgp
    }

    pub fn ebgp_underlay(&self) -> bool {
        self.underlay == Underlay::Ebgp
    }
}

/// Topology represents a named fabric deployment scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Uuid>,
}

impl_node!(Topology, Kind::Topology, |n| n.name.clone());

impl Topology {
    pub fn group_name(&self) -> String {
        format!("{}_topology", self.name)
    }
}

/// One role x device-type x quantity line of a topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyElement {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub topology: Uuid,
    pub device_role: DeviceRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<Uuid>,
    pub quantity: u32,
    pub mtu: u32,
    #[serde(default)]
    pub mlag_support: bool,
    #[serde(default)]
    pub border: bool,
}

impl_node!(TopologyElement, Kind::TopologyElement, |n| n.name.clone());

impl TopologyElement {
    /// Border flag only changes naming and cabling for non-spine roles
    pub fn is_border_leaf(&self) -> bool {
        self.border && self.device_role == DeviceRole::Leaf
    }

    /// Device name for the 1-based `index`-th instance of this element
    pub fn device_name(&self, topology_name: &str, index: u32) -> String {
        device_name(topology_name, self.device_role, self.border, index)
    }
}

/// `{topology}-{role}{index}`, or `{topology}-border{role}{index}` for
/// border elements other than spines.
pub fn device_name(topology_name: &str, role: DeviceRole, border: bool, index: u32) -> String {
    if border && role != DeviceRole::Spine {
        format!("{}-border{}{}", topology_name, role, index)
    } else {
        format!("{}-{}{}", topology_name, role, index)
    }
}
