use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Kind;

/// Autonomous system, named `AS<n>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomousSystem {
    pub id: Uuid,
    pub name: String,
    pub asn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl_node!(AutonomousSystem, Kind::AutonomousSystem, |n| n.name.clone());

impl AutonomousSystem {
    pub fn name_for(asn: u32) -> String {
        format!("AS{}", asn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpPeerGroup {
    pub id: Uuid,
    pub name: String,
    pub local_as: Uuid,
    pub remote_as: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl_node!(BgpPeerGroup, Kind::BgpPeerGroup, |n| n.name.clone());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionType {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Backbone,
    Upstream,
    Peering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Provisioning,
}

/// One half of a BGP peering; `peer_session` points at the other half
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpSession {
    pub id: Uuid,
    pub name: String,
    pub device: Uuid,
    pub local_as: Uuid,
    pub remote_as: Uuid,
    pub local_ip: Uuid,
    pub remote_ip: Uuid,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub role: SessionRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_group: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_session: Option<Uuid>,
    #[serde(default)]
    pub description: String,
}

impl_node!(BgpSession, Kind::BgpSession, |n| n.name.clone());
