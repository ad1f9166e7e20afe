use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Kind;

/// Namespace every generated address and prefix lives in
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vrf {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl_node!(Vrf, Kind::Vrf, |n| n.name.clone());

/// Building-level location owning the address space of its fabrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub shortname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supernet: Option<Ipv4Network>,
}

impl_node!(Location, Kind::Location, |n| n.shortname.clone());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixRole {
    Supernet,
    Public,
    Management,
    Technical,
    Loopback,
    LoopbackVtep,
    Server,
    Container,
}

impl PrefixRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefixRole::Supernet => "supernet",
            PrefixRole::Public => "public",
            PrefixRole::Management => "management",
            PrefixRole::Technical => "technical",
            PrefixRole::Loopback => "loopback",
            PrefixRole::LoopbackVtep => "loopback-vtep",
            PrefixRole::Server => "server",
            PrefixRole::Container => "container",
        }
    }
}

impl fmt::Display for PrefixRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixStatus {
    Active,
    Reserved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefix {
    pub id: Uuid,
    pub prefix: Ipv4Network,
    #[serde(default)]
    pub description: String,
    pub role: PrefixRole,
    pub status: PrefixStatus,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Uuid>,
}

impl_node!(Prefix, Kind::Prefix, |n| n.prefix.to_string());

/// Host address with its prefix length (`10.0.2.1/32`, `10.0.0.5/24`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: Uuid,
    pub address: Ipv4Network,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<Uuid>,
}

impl_node!(IpAddress, Kind::IpAddress, |n| n.address.to_string());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlanRole {
    Server,
    Management,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vlan {
    pub id: Uuid,
    pub name: String,
    pub vlan_id: u16,
    pub role: VlanRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Uuid>,
}

impl_node!(Vlan, Kind::Vlan, |n| n.name.clone());

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
