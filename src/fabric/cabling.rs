use anyhow::Result;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use uuid::Uuid;

use super::pools::CapacityError;
use super::{LinkReport, PeerLinkReport, TopologyRun};
use crate::db::{NotFoundError, SaveOptions};
use crate::models::{
    device_name, interface_key, DeviceRole, Interface, InterfaceRole, InterfaceStatus, IpAddress, Prefix,
    PrefixRole, PrefixStatus,
};
use crate::utils::pair_number;

/// Leaf tier cabled towards the spines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafTier {
    Leaf,
    BorderLeaf,
}

impl LeafTier {
    pub fn label(&self) -> &'static str {
        match self {
            LeafTier::Leaf => "leaf",
            LeafTier::BorderLeaf => "borderleaf",
        }
    }

    /// Spine port role this tier lands on
    pub fn spine_port_role(&self) -> InterfaceRole {
        match self {
            LeafTier::Leaf => InterfaceRole::Leaf,
            LeafTier::BorderLeaf => InterfaceRole::Uplink,
        }
    }

    pub fn device_name(&self, topology_name: &str, index: u32) -> String {
        device_name(topology_name, DeviceRole::Leaf, *self == LeafTier::BorderLeaf, index)
    }
}

/// Port used by the `index`-th (1-based) member of a redundant pairing.
///
/// Pair 1 uses ports 0 and 1; pair n uses ports 2(n-1) and 2(n-1)+1.
/// Odd members take the first port of their pair, even members the second.
pub fn pair_port<S>(index: u32, ports: &[S]) -> Option<&S> {
    let pair = pair_number(index);
    let odd = index % 2 != 0;
    if pair == 1 {
        if ports.len() < 2 {
            return None;
        }
        return Some(if odd { &ports[0] } else { &ports[1] });
    }
    let offset = ((pair - 1) * 2) as usize;
    if ports.len() < offset + 1 {
        return None;
    }
    ports.get(if odd { offset } else { offset + 1 })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub leaf_index: u32,
    pub spine_index: u32,
    pub spine_port: String,
    pub leaf_port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CablingPlan {
    pub links: Vec<PlannedLink>,
    pub errors: Vec<CapacityError>,
}

/// Plan every spine <-> leaf link of one tier.
///
/// `spine_ports` are the spine ports flagged for this tier, `leaf_ports`
/// the leaf uplinks. Running out of ports ends that loop with an error
/// in the plan; links planned so far are kept.
pub fn plan_fabric_links(
    tier: LeafTier,
    spine_quantity: u32,
    leaf_quantity: u32,
    spine_ports: &[String],
    leaf_ports: &[String],
) -> CablingPlan {
    let mut plan = CablingPlan::default();

    for leaf_index in 1..=leaf_quantity {
        if leaf_index as usize > spine_ports.len() {
            plan.errors.push(CapacityError::new(
                format!("spine {} ports", tier.spine_port_role()),
                format!(
                    "The quantity of {} requested ({}) is superior to the number of interfaces flagged as '{}' ({})",
                    tier.label(),
                    leaf_quantity,
                    tier.spine_port_role(),
                    spine_ports.len()
                ),
            ));
            break;
        }
        let Some(spine_port) = pair_port(leaf_index, spine_ports) else {
            continue;
        };

        for spine_index in 1..=spine_quantity {
            if spine_index as usize > leaf_ports.len() {
                let err = CapacityError::new(
                    format!("{} uplink ports", tier.label()),
                    format!(
                        "The quantity of spines requested ({}) is superior to the number of interfaces flagged as 'uplink' ({})",
                        spine_quantity,
                        leaf_ports.len()
                    ),
                );
                if !plan.errors.contains(&err) {
                    plan.errors.push(err);
                }
                break;
            }
            let Some(leaf_port) = pair_port(spine_index, leaf_ports) else {
                continue;
            };

            plan.links.push(PlannedLink {
                leaf_index,
                spine_index,
                spine_port: spine_port.clone(),
                leaf_port: leaf_port.clone(),
            });
        }
    }
    plan
}

/// Redundant pairing needs an even member count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingError {
    pub tier: LeafTier,
    pub quantity: u32,
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The number of {} must be even to form pairs ({} requested)",
            self.tier.label(),
            self.quantity
        )
    }
}

impl std::error::Error for PairingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLink {
    pub first_index: u32,
    pub second_index: u32,
    pub port: String,
}

/// Wire (1,2), (3,4), ... port-for-port over the peer ports
pub fn plan_peer_links(tier: LeafTier, quantity: u32, peer_ports: &[String]) -> Result<Vec<PeerLink>, PairingError> {
    if quantity % 2 != 0 {
        return Err(PairingError { tier, quantity });
    }
    let mut links = Vec::new();
    for first_index in (1..=quantity).step_by(2) {
        for port in peer_ports {
            links.push(PeerLink {
                first_index,
                second_index: first_index + 1,
                port: port.clone(),
            });
        }
    }
    Ok(links)
}

/// A cabled spine <-> leaf link, as needed by the BGP session builder
pub(super) struct RealizedLink {
    pub leaf_index: u32,
    pub spine_name: String,
    pub leaf_name: String,
    pub subnet: Ipv4Network,
    pub spine_ip: IpAddress,
    pub leaf_ip: IpAddress,
    pub spine_description: String,
    pub leaf_description: String,
}

/// Port lists and quantities of a topology's fabric elements
#[derive(Debug, Default)]
pub(super) struct FabricPorts {
    pub spine_quantity: u32,
    pub leaf_quantity: u32,
    pub border_leaf_quantity: u32,
    pub spine_leaf: Vec<String>,
    pub spine_uplink: Vec<String>,
    pub leaf_uplink: Vec<String>,
    pub leaf_peer: Vec<String>,
    pub border_leaf_uplink: Vec<String>,
    pub border_leaf_peer: Vec<String>,
}

impl TopologyRun<'_> {
    /// Cable spines, leaves and border leaves. Returns false when the
    /// topology has no spine/leaf ports to cable at all.
    pub(super) async fn cable(&mut self, ports: &FabricPorts) -> Result<bool> {
        if ports.spine_leaf.is_empty() || ports.leaf_uplink.is_empty() {
            tracing::error!("No 'uplink' interfaces found on leaf or no 'leaf' interfaces on spines");
            return Ok(false);
        }

        let plan = plan_fabric_links(
            LeafTier::Leaf,
            ports.spine_quantity,
            ports.leaf_quantity,
            &ports.spine_leaf,
            &ports.leaf_uplink,
        );
        self.realize(LeafTier::Leaf, plan).await?;

        if ports.border_leaf_quantity > 0 {
            let plan = plan_fabric_links(
                LeafTier::BorderLeaf,
                ports.spine_quantity,
                ports.border_leaf_quantity,
                &ports.spine_uplink,
                &ports.border_leaf_uplink,
            );
            self.realize(LeafTier::BorderLeaf, plan).await?;
        }

        self.connect_peers(LeafTier::Leaf, ports.leaf_quantity, &ports.leaf_peer).await?;
        self.connect_peers(LeafTier::BorderLeaf, ports.border_leaf_quantity, &ports.border_leaf_peer)
            .await?;
        Ok(true)
    }

    async fn realize(&mut self, tier: LeafTier, plan: CablingPlan) -> Result<()> {
        for err in plan.errors {
            self.capacity_error(err);
        }

        for link in &plan.links {
            let realized = match self.connect(tier, link).await {
                Ok(Some(realized)) => realized,
                // Technical pool exhausted, every later link would fail too
                Ok(None) => break,
                Err(e) if e.downcast_ref::<NotFoundError>().is_some() => {
                    let msg = format!(
                        "Skipping {}{} <-> spine{}: {}",
                        tier.label(),
                        link.leaf_index,
                        link.spine_index,
                        e
                    );
                    tracing::error!("{}", msg);
                    self.report.errors.push(msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if self.ebgp_underlay() {
                self.build_underlay_sessions(tier, &realized).await?;
            }
        }
        Ok(())
    }

    async fn connect(&mut self, tier: LeafTier, link: &PlannedLink) -> Result<Option<RealizedLink>> {
        let spine_name = device_name(&self.topology.name, DeviceRole::Spine, false, link.spine_index);
        let leaf_name = tier.device_name(&self.topology.name, link.leaf_index);

        let mut spine_intf: Interface = self.client.get(&interface_key(&spine_name, &link.spine_port)).await?;
        let mut leaf_intf: Interface = self.client.get(&interface_key(&leaf_name, &link.leaf_port)).await?;

        let subnet = match self.pools.technical.allocator.next() {
            Ok(subnet) => subnet,
            Err(e) => {
                self.capacity_error(e);
                return Ok(None);
            }
        };
        let spine_addr = Ipv4Network::new(subnet.network(), 31)?;
        let leaf_addr = Ipv4Network::new(Ipv4Addr::from(u32::from(subnet.network()) + 1), 31)?;

        let prefix = Prefix {
            id: Uuid::new_v4(),
            prefix: subnet,
            description: format!("{}-ico-{}", self.location.shortname.to_lowercase(), subnet.network()),
            role: PrefixRole::Technical,
            status: PrefixStatus::Active,
            namespace: self.pools.technical.prefix.namespace.clone(),
            location: Some(self.location.id),
            vrf: Some(self.backbone_vrf.id),
            organization: Some(self.tenant.id),
        };
        let prefix = self.client.create_and_save(prefix, SaveOptions::default()).await?;

        let spine_description = format!("{} to {}", spine_intf.description, leaf_intf.description);
        let leaf_description = format!("{} to {}", leaf_intf.description, spine_intf.description);

        let spine_ip = super::devices::new_ip_address(&prefix, &spine_intf, spine_addr, spine_intf.description.clone());
        let spine_ip = self.client.create_and_save(spine_ip, SaveOptions::default()).await?;
        let leaf_ip = super::devices::new_ip_address(&prefix, &leaf_intf, leaf_addr, leaf_intf.description.clone());
        let leaf_ip = self.client.create_and_save(leaf_ip, SaveOptions::default()).await?;

        spine_intf.description = spine_description.clone();
        spine_intf.status = InterfaceStatus::Active;
        spine_intf.connected_endpoint = Some(leaf_intf.id);
        let spine_intf = self.client.save(&spine_intf).await?;

        leaf_intf.description = leaf_description.clone();
        leaf_intf.status = InterfaceStatus::Active;
        leaf_intf.connected_endpoint = Some(spine_intf.id);
        let leaf_intf = self.client.save(&leaf_intf).await?;

        self.cache.set(&spine_intf);
        self.cache.set(&leaf_intf);
        tracing::info!(
            "- Connected {}-{} to {}-{}",
            leaf_name,
            link.leaf_port,
            spine_name,
            link.spine_port
        );
        self.report.links.push(LinkReport {
            spine: spine_name.clone(),
            spine_port: link.spine_port.clone(),
            leaf: leaf_name.clone(),
            leaf_port: link.leaf_port.clone(),
            subnet,
        });

        Ok(Some(RealizedLink {
            leaf_index: link.leaf_index,
            spine_name,
            leaf_name,
            subnet,
            spine_ip,
            leaf_ip,
            spine_description,
            leaf_description,
        }))
    }

    async fn connect_peers(&mut self, tier: LeafTier, quantity: u32, peer_ports: &[String]) -> Result<()> {
        if quantity == 0 {
            return Ok(());
        }
        if peer_ports.is_empty() {
            let msg = format!("No 'peer' interfaces found on {}", tier.label());
            tracing::error!("{}", msg);
            self.report.errors.push(msg);
            return Ok(());
        }
        let links = match plan_peer_links(tier, quantity, peer_ports) {
            Ok(links) => links,
            Err(e) => {
                tracing::error!("{}", e);
                self.report.errors.push(e.to_string());
                return Ok(());
            }
        };

        for link in links {
            let first_name = tier.device_name(&self.topology.name, link.first_index);
            let second_name = tier.device_name(&self.topology.name, link.second_index);
            let first = self.client.find::<Interface>(&interface_key(&first_name, &link.port)).await?;
            let second = self.client.find::<Interface>(&interface_key(&second_name, &link.port)).await?;
            let (Some(mut first), Some(mut second)) = (first, second) else {
                let msg = format!("Missing peer interface {} between {} and {}", link.port, first_name, second_name);
                tracing::error!("{}", msg);
                self.report.errors.push(msg);
                continue;
            };

            let first_description = format!("{} to {}", first.description, second.description);
            let second_description = format!("{} to {}", second.description, first.description);

            first.description = first_description;
            first.status = InterfaceStatus::Active;
            first.connected_endpoint = Some(second.id);
            let first = self.client.save(&first).await?;

            second.description = second_description;
            second.status = InterfaceStatus::Active;
            second.connected_endpoint = Some(first.id);
            let second = self.client.save(&second).await?;

            self.cache.set(&first);
            self.cache.set(&second);
            tracing::info!("- Connected {}-{} to {}-{}", first_name, link.port, second_name, link.port);
            self.report.peer_links.push(PeerLinkReport {
                first: first_name,
                second: second_name,
                port: link.port,
            });
        }
        Ok(())
    }
}
