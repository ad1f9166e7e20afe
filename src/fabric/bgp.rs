use anyhow::Result;
use ipnetwork::Ipv4Network;
use uuid::Uuid;

use super::cabling::{LeafTier, RealizedLink};
use super::TopologyRun;
use crate::db::SaveOptions;
use crate::models::{BgpPeerGroup, BgpSession, Device, SessionRole, SessionStatus, SessionType};
use crate::utils::{pair_number, remove_interface_prefixes};

/// (spine-side, leaf-side) peer group names for one leaf pair
pub fn peer_group_names(topology_name: &str, tier: LeafTier, leaf_pair: u32) -> (String, String) {
    (
        format!("{}-underlay-spine-{}-pair{}", topology_name, tier.label(), leaf_pair),
        format!("{}-underlay-{}-pair{}-spine", topology_name, tier.label(), leaf_pair),
    )
}

/// (spine-side, leaf-side) session keys for one link subnet
pub fn session_keys(tier: LeafTier, subnet: Ipv4Network) -> (String, String) {
    (
        format!("spine-{}", subnet),
        format!("{}-{}", tier.label(), subnet),
    )
}

impl TopologyRun<'_> {
    async fn peer_group(&self, name: String, local_as: Uuid, remote_as: Uuid) -> Result<BgpPeerGroup> {
        let group = BgpPeerGroup {
            id: Uuid::new_v4(),
            name,
            local_as,
            remote_as,
            description: Some(format!("BGP group for {} underlay", self.topology.name)),
        };
        self.client.create_and_save(group, SaveOptions::default()).await
    }

    /// Peer groups and the two eBGP session halves of one cabled link
    pub(super) async fn build_underlay_sessions(&mut self, tier: LeafTier, link: &RealizedLink) -> Result<()> {
        let spine: Device = self.client.get(&link.spine_name).await?;
        let leaf: Device = self.client.get(&link.leaf_name).await?;

        let (spine_group, leaf_group) = peer_group_names(&self.topology.name, tier, pair_number(link.leaf_index));
        let spine_group = self.peer_group(spine_group, spine.asn, leaf.asn).await?;
        let leaf_group = self.peer_group(leaf_group, leaf.asn, spine.asn).await?;

        let (spine_key, leaf_key) = session_keys(tier, link.subnet);
        let spine_session = BgpSession {
            id: Uuid::new_v4(),
            name: spine_key,
            device: spine.id,
            local_as: spine.asn,
            remote_as: leaf.asn,
            local_ip: link.spine_ip.id,
            remote_ip: link.leaf_ip.id,
            session_type: SessionType::External,
            status: SessionStatus::Active,
            role: SessionRole::Backbone,
            peer_group: Some(spine_group.id),
            peer_session: None,
            description: remove_interface_prefixes(&link.spine_description),
        };
        let mut spine_session = self.client.create_and_save(spine_session, SaveOptions::default()).await?;

        let leaf_session = BgpSession {
            id: Uuid::new_v4(),
            name: leaf_key,
            device: leaf.id,
            local_as: leaf.asn,
            remote_as: spine.asn,
            local_ip: link.leaf_ip.id,
            remote_ip: link.spine_ip.id,
            session_type: SessionType::External,
            status: SessionStatus::Active,
            role: SessionRole::Backbone,
            peer_group: Some(leaf_group.id),
            peer_session: Some(spine_session.id),
            description: remove_interface_prefixes(&link.leaf_description),
        };
        let leaf_session = self.client.create_and_save(leaf_session, SaveOptions::default()).await?;

        spine_session.peer_session = Some(leaf_session.id);
        let spine_session = self.client.save(&spine_session).await?;

        self.report.bgp_sessions.push(spine_session.name);
        self.report.bgp_sessions.push(leaf_session.name);
        Ok(())
    }
}
