use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Implements [`Node`] for a model carrying an `id: Uuid` field.
/// The closure-like tail computes the business key.
macro_rules! impl_node {
    ($ty:ty, $kind:expr, |$n:ident| $key:expr) => {
        impl $crate::models::Node for $ty {
            const KIND: $crate::models::Kind = $kind;

            fn id(&self) -> uuid::Uuid {
                self.id
            }

            fn set_id(&mut self, id: uuid::Uuid) {
                self.id = id;
            }

            fn key(&self) -> String {
                let $n = self;
                $key
            }
        }
    };
}

mod bgp;
mod devices;
mod ipam;
mod topology;

pub use bgp::*;
pub use devices::*;
pub use ipam::*;
pub use topology::*;

/// Node kinds held by the graph store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Organization,
    AutonomousSystem,
    Vrf,
    Location,
    Prefix,
    IpAddress,
    Vlan,
    Platform,
    DeviceType,
    Group,
    Strategy,
    Topology,
    TopologyElement,
    Device,
    Interface,
    BgpPeerGroup,
    BgpSession,
}

impl Kind {
    pub const ALL: &'static [Kind] = &[
        Kind::Organization,
        Kind::AutonomousSystem,
        Kind::Vrf,
        Kind::Location,
        Kind::Prefix,
        Kind::IpAddress,
        Kind::Vlan,
        Kind::Platform,
        Kind::DeviceType,
        Kind::Group,
        Kind::Strategy,
        Kind::Topology,
        Kind::TopologyElement,
        Kind::Device,
        Kind::Interface,
        Kind::BgpPeerGroup,
        Kind::BgpSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Organization => "organization",
            Kind::AutonomousSystem => "autonomous_system",
            Kind::Vrf => "vrf",
            Kind::Location => "location",
            Kind::Prefix => "prefix",
            Kind::IpAddress => "ip_address",
            Kind::Vlan => "vlan",
            Kind::Platform => "platform",
            Kind::DeviceType => "device_type",
            Kind::Group => "group",
            Kind::Strategy => "strategy",
            Kind::Topology => "topology",
            Kind::TopologyElement => "topology_element",
            Kind::Device => "device",
            Kind::Interface => "interface",
            Kind::BgpPeerGroup => "bgp_peer_group",
            Kind::BgpSession => "bgp_session",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown node kind: {}", s))
    }
}

/// A typed model stored as a node in the graph store.
///
/// Every node has a store-assigned identity and a business key that is
/// unique within its kind (device name, prefix CIDR, ...). Upserts match
/// on the business key.
pub trait Node: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn key(&self) -> String;
}

/// Shared organization (tenant) owning generated resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl_node!(Organization, Kind::Organization, |n| n.name.clone());

/// Named membership group (`<platform>_devices`, `<topology>_topology`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

impl_node!(Group, Kind::Group, |n| n.name.clone());

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            members: Vec::new(),
        }
    }

    /// Add a member once. Returns true if the membership changed.
    pub fn add_member(&mut self, id: Uuid) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.push(id);
        true
    }
}
