use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{DeviceRole, Kind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Provisioning,
    Maintenance,
}

/// Platform (OS family) a device type runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl_node!(Platform, Kind::Platform, |n| n.name.clone());

impl Platform {
    /// `Arista EOS` -> `arista_devices`
    pub fn group_name(&self) -> String {
        let family = self.name.split(' ').next().unwrap_or_default().to_lowercase();
        format!("{}_devices", family)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Uuid>,
}

impl_node!(DeviceType, Kind::DeviceType, |n| n.name.clone());

/// Device generated from a topology element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub location: Uuid,
    pub role: DeviceRole,
    pub device_type: Uuid,
    pub platform: Uuid,
    pub asn: Uuid,
    pub topology: Uuid,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_address: Option<Uuid>,
}

impl_node!(Device, Kind::Device, |n| n.name.clone());

/// Interface role vocabulary shared by L3 and L2 interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceRole {
    Backbone,
    Upstream,
    Peering,
    Uplink,
    Leaf,
    Spare,
    Loopback,
    Management,
    Peer,
    Server,
}

impl InterfaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceRole::Backbone => "backbone",
            InterfaceRole::Upstream => "upstream",
            InterfaceRole::Peering => "peering",
            InterfaceRole::Uplink => "uplink",
            InterfaceRole::Leaf => "leaf",
            InterfaceRole::Spare => "spare",
            InterfaceRole::Loopback => "loopback",
            InterfaceRole::Management => "management",
            InterfaceRole::Peer => "peer",
            InterfaceRole::Server => "server",
        }
    }

    /// Layer an interface with this role is created on
    pub fn layer(&self) -> InterfaceLayer {
        match self {
            InterfaceRole::Peer | InterfaceRole::Server => InterfaceLayer::L2,
            _ => InterfaceLayer::L3,
        }
    }
}

impl fmt::Display for InterfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceLayer {
    L2,
    L3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Active,
    Provisioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L2Mode {
    Access,
    Trunk,
}

/// Device interface; physical ports start `provisioning` and become
/// `active` once cabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub id: Uuid,
    pub device: Uuid,
    pub device_name: String,
    pub name: String,
    pub role: InterfaceRole,
    pub layer: InterfaceLayer,
    pub status: InterfaceStatus,
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub speed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_mode: Option<L2Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tagged_vlans: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_endpoint: Option<Uuid>,
}

impl_node!(Interface, Kind::Interface, |n| interface_key(&n.device_name, &n.name));

fn default_enabled() -> bool {
    true
}

/// Business key of an interface: `{device}-{interface}`
pub fn interface_key(device_name: &str, interface_name: &str) -> String {
    format!("{}-{}", device_name, interface_name)
}

/// `{interface}.{device}`, lowercased with spaces removed from the
/// interface name (`Loopback 0` -> `loopback0.fra05-pod1-leaf1`)
pub fn interface_description(interface_name: &str, device_name: &str) -> String {
    format!(
        "{}.{}",
        interface_name.to_lowercase().replace(' ', ""),
        device_name.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_description() {
        assert_eq!(interface_description("Loopback 0", "R1-Leaf1"), "loopback0.r1-leaf1");
        assert_eq!(interface_description("Ethernet10", "fra05-pod1-spine1"), "ethernet10.fra05-pod1-spine1");
    }

    #[test]
    fn test_role_layer() {
        assert_eq!(InterfaceRole::Peer.layer(), InterfaceLayer::L2);
        assert_eq!(InterfaceRole::Server.layer(), InterfaceLayer::L2);
        assert_eq!(InterfaceRole::Spare.layer(), InterfaceLayer::L3);
        assert_eq!(InterfaceRole::Uplink.layer(), InterfaceLayer::L3);
        assert_eq!(InterfaceRole::Management.layer(), InterfaceLayer::L3);
    }

    #[test]
    fn test_platform_group_name() {
        let platform = Platform { id: Uuid::new_v4(), name: "Arista EOS".to_string(), description: None };
        assert_eq!(platform.group_name(), "arista_devices");
    }
}
