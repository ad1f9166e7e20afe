mod asn;
mod bgp;
mod cabling;
pub mod catalog;
pub mod checks;
mod devices;
pub mod pools;
pub mod transforms;

pub use checks::{check_all_topologies, check_device_topology};
pub use transforms::computed_link_description;

use anyhow::Result;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::GeneratorSettings;
use crate::db::{GraphClient, NodeCache, NotFoundError};
use crate::models::{
    AutonomousSystem, Device, DeviceType, Group, Interface, IpAddress, Location, Organization, Platform, Prefix,
    Strategy, Topology, TopologyElement, Vlan, VlanRole, Vrf,
};
use pools::{CapacityError, LocationPools};

#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub spine: String,
    pub spine_port: String,
    pub leaf: String,
    pub leaf_port: String,
    pub subnet: Ipv4Network,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerLinkReport {
    pub first: String,
    pub second: String,
    pub port: String,
}

/// What one topology run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub topology: String,
    pub location: String,
    pub devices: Vec<String>,
    pub links: Vec<LinkReport>,
    pub peer_links: Vec<PeerLinkReport>,
    pub bgp_sessions: Vec<String>,
    /// Capacity and pairing problems that skipped part of the run
    pub errors: Vec<String>,
}

/// State shared by the synthesis, cabling and BGP steps of one topology
pub(crate) struct TopologyRun<'a> {
    client: &'a GraphClient,
    cache: &'a mut NodeCache,
    topology: &'a Topology,
    topology_index: u32,
    location: Location,
    strategy: Option<Strategy>,
    tenant: Organization,
    internal_as: AutonomousSystem,
    backbone_vrf: Vrf,
    vlan_pxe: Option<Vlan>,
    vlans_server: Vec<Vlan>,
    pools: &'a mut LocationPools,
    report: GenerationReport,
}

impl TopologyRun<'_> {
    fn uses_ebgp(&self) -> bool {
        self.strategy.as_ref().is_some_and(Strategy::uses_ebgp)
    }

    fn ebgp_underlay(&self) -> bool {
        self.strategy.as_ref().is_some_and(Strategy::ebgp_underlay)
    }

    fn capacity_error(&mut self, err: CapacityError) {
        tracing::error!("{}", err);
        self.report.errors.push(err.message);
    }
}

async fn populate_cache(client: &GraphClient, cache: &mut NodeCache) -> Result<()> {
    cache.populate(&client.all::<Organization>().await?);
    cache.populate(&client.all::<AutonomousSystem>().await?);
    cache.populate(&client.all::<Vrf>().await?);
    cache.populate(&client.all::<Group>().await?);
    cache.populate(&client.all::<Platform>().await?);
    cache.populate(&client.all::<DeviceType>().await?);
    cache.populate(&client.all::<Prefix>().await?);
    cache.populate(&client.all::<Location>().await?);
    cache.populate(&client.all::<Strategy>().await?);
    Ok(())
}

/// Reserve every address already assigned to an interface of a device at
/// `location` for that device's topology.
async fn reserve_held_addresses(client: &GraphClient, location: &Location, pools: &mut LocationPools) -> Result<()> {
    let device_topologies: HashMap<Uuid, Uuid> = client
        .filters::<Device, _>(|d| d.location == location.id)
        .await?
        .into_iter()
        .map(|d| (d.id, d.topology))
        .collect();
    if device_topologies.is_empty() {
        return Ok(());
    }

    let interface_topologies: HashMap<Uuid, Uuid> = client
        .filters::<Interface, _>(|i| device_topologies.contains_key(&i.device))
        .await?
        .into_iter()
        .filter_map(|i| device_topologies.get(&i.device).map(|topology| (i.id, *topology)))
        .collect();

    let mut reserved = 0;
    for address in client.all::<IpAddress>().await? {
        if let Some(topology) = address.interface.and_then(|id| interface_topologies.get(&id)) {
            pools.reserve(address.address, *topology);
            reserved += 1;
        }
    }
    tracing::debug!("Reserved {} held addresses at {}", reserved, location.name);
    Ok(())
}

/// Generate every topology in store order, or only the one named by
/// `topology_filter`. Topologies that stop early are logged and left
/// out of the result.
pub async fn generate_all(
    client: &GraphClient,
    settings: &GeneratorSettings,
    topology_filter: Option<&str>,
) -> Result<Vec<GenerationReport>> {
    let mut cache = NodeCache::new();
    populate_cache(client, &mut cache).await?;

    let mut pools: HashMap<Uuid, LocationPools> = HashMap::new();
    let mut reports = Vec::new();

    for (index, topology) in client.all::<Topology>().await?.iter().enumerate() {
        if topology_filter.is_some_and(|name| name != topology.name) {
            continue;
        }
        tracing::info!("Generating topology {}", topology.name);
        match generate_topology(client, &mut cache, settings, topology, index as u32, &mut pools).await {
            Ok(Some(report)) => {
                tracing::info!(
                    "Topology {}: {} devices, {} links, {} BGP sessions",
                    report.topology,
                    report.devices.len(),
                    report.links.len(),
                    report.bgp_sessions.len()
                );
                reports.push(report);
            }
            Ok(None) => tracing::warn!("Topology {} stopped before completion", topology.name),
            Err(e) => tracing::error!("Failed to generate topology {}: {:#}", topology.name, e),
        }
    }
    Ok(reports)
}

/// Synthesize, cable and peer one topology.
///
/// `Ok(None)` means a prerequisite was missing; the reason is logged.
/// `topology_index` seeds the ASN numbering.
pub async fn generate_topology(
    client: &GraphClient,
    cache: &mut NodeCache,
    settings: &GeneratorSettings,
    topology: &Topology,
    topology_index: u32,
    pools: &mut HashMap<Uuid, LocationPools>,
) -> Result<Option<GenerationReport>> {
    let Some(location_id) = topology.location else {
        tracing::error!("{} is not associated with a Location.", topology.name);
        return Ok(None);
    };
    let location: Location = match client.get_by_id(location_id).await {
        Ok(location) => location,
        Err(e) if e.downcast_ref::<NotFoundError>().is_some() => {
            tracing::error!("{} is not associated with a Location.", topology.name);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let Some(tenant) = cache.get::<Organization>(&settings.tenant_name) else {
        tracing::error!("Organization {} not found", settings.tenant_name);
        return Ok(None);
    };
    let Some(internal_as) = cache.get::<AutonomousSystem>(&settings.internal_asn_name) else {
        tracing::error!("Internal AS {} not found", settings.internal_asn_name);
        return Ok(None);
    };
    let Some(backbone_vrf) = cache.get::<Vrf>(&settings.backbone_vrf) else {
        tracing::error!("VRF {} not found", settings.backbone_vrf);
        return Ok(None);
    };
    let strategy = match topology.strategy {
        Some(id) => Some(client.get_by_id::<Strategy>(id).await?),
        None => None,
    };

    let pxe_name = format!("{}_server-pxe", location.shortname.to_lowercase());
    let vlans = client.filters::<Vlan, _>(|v| v.location == Some(location.id)).await?;
    let vlan_pxe = vlans.iter().find(|v| v.name == pxe_name).cloned();
    let vlans_server: Vec<Vlan> = vlans
        .into_iter()
        .filter(|v| v.role == VlanRole::Server && v.name != pxe_name)
        .collect();

    let location_pools = match pools.entry(location.id) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let prefixes = client
                .filters::<Prefix, _>(|p| p.location == Some(location.id))
                .await?;
            if prefixes.is_empty() {
                tracing::error!("{} doesn't have any prefixes", location.name);
                return Ok(None);
            }
            match LocationPools::from_prefixes(&location.shortname, &prefixes) {
                Ok(mut built) => {
                    reserve_held_addresses(client, &location, &mut built).await?;
                    entry.insert(built)
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    return Ok(None);
                }
            }
        }
    };
    location_pools.claim_for(topology.id);

    let mut elements = client
        .filters::<TopologyElement, _>(|e| e.topology == topology.id)
        .await?;
    // Spines first, so their devices exist before anything is cabled
    elements.sort_by(|a, b| b.device_role.as_str().cmp(a.device_role.as_str()));

    let mut run = TopologyRun {
        client,
        cache,
        topology,
        topology_index,
        report: GenerationReport {
            topology: topology.name.clone(),
            location: location.shortname.clone(),
            ..Default::default()
        },
        location,
        strategy,
        tenant,
        internal_as,
        backbone_vrf,
        vlan_pxe,
        vlans_server,
        pools: location_pools,
    };

    let ports = run.synthesize_devices(&elements).await?;
    if !run.cable(&ports).await? {
        return Ok(None);
    }
    Ok(Some(run.report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seeds, MemoryStore};
    use crate::models::{BgpSession, InterfaceRole, InterfaceStatus, PrefixRole};
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn seeded() -> GraphClient {
        let client = GraphClient::new(Arc::new(MemoryStore::new()), 4);
        seeds::seed(&client, &GeneratorSettings::default()).await.unwrap();
        client
    }

    async fn generate(client: &GraphClient, name: &str) -> Vec<GenerationReport> {
        generate_all(client, &GeneratorSettings::default(), Some(name)).await.unwrap()
    }

    #[tokio::test]
    async fn test_generate_small_fabric() {
        let client = seeded().await;
        let reports = generate(&client, "fra05-pod1").await;
        assert_eq!(reports.len(), 1);
        let report = &reports[0];

        assert_eq!(
            report.devices,
            vec!["fra05-pod1-spine1", "fra05-pod1-spine2", "fra05-pod1-leaf1", "fra05-pod1-leaf2"]
        );
        assert_eq!(report.links.len(), 4);
        assert!(report.errors.is_empty(), "{:?}", report.errors);

        let subnets: HashSet<Ipv4Network> = report.links.iter().map(|l| l.subnet).collect();
        assert_eq!(subnets.len(), 4);
        assert!(report.links.iter().all(|l| l.subnet.prefix() == 31));

        // leaf1 faces Ethernet1 on both spines, leaf2 Ethernet2
        let first = &report.links[0];
        assert_eq!(
            (first.spine.as_str(), first.spine_port.as_str(), first.leaf.as_str(), first.leaf_port.as_str()),
            ("fra05-pod1-spine1", "Ethernet1", "fra05-pod1-leaf1", "Ethernet10")
        );
        assert_eq!(report.links[3].spine_port, "Ethernet2");
        assert_eq!(report.links[3].leaf_port, "Ethernet11");

        assert_eq!(report.peer_links.len(), 2);
        assert_eq!(report.bgp_sessions.len(), 8);
    }

    #[tokio::test]
    async fn test_cabled_interfaces_point_at_each_other() {
        let client = seeded().await;
        generate(&client, "fra05-pod1").await;

        let spine: Interface = client.get("fra05-pod1-spine1-Ethernet1").await.unwrap();
        let leaf: Interface = client.get("fra05-pod1-leaf1-Ethernet10").await.unwrap();
        assert_eq!(spine.status, InterfaceStatus::Active);
        assert_eq!(spine.connected_endpoint, Some(leaf.id));
        assert_eq!(leaf.connected_endpoint, Some(spine.id));
        assert_eq!(spine.description, "ethernet1.fra05-pod1-spine1 to ethernet10.fra05-pod1-leaf1");

        let spare: Interface = client.get("fra05-pod1-spine1-Ethernet14").await.unwrap();
        assert_eq!(spare.status, InterfaceStatus::Provisioning);
        assert!(spare.connected_endpoint.is_none());

        let server: Interface = client.get("fra05-pod1-leaf1-Ethernet1").await.unwrap();
        let pxe: Vlan = client.get("fra05_server-pxe").await.unwrap();
        assert_eq!(server.untagged_vlan, Some(pxe.id));
        assert_eq!(server.tagged_vlans.len(), 2);
        assert!(!server.tagged_vlans.contains(&pxe.id));
    }

    #[tokio::test]
    async fn test_link_addresses_come_from_technical_prefix() {
        let client = seeded().await;
        let reports = generate(&client, "fra05-pod1").await;
        let link = &reports[0].links[0];
        assert_eq!(link.subnet, "10.1.1.0/31".parse::<Ipv4Network>().unwrap());

        let spine_ip: IpAddress = client.get("10.1.1.0/31").await.unwrap();
        let leaf_ip: IpAddress = client.get("10.1.1.1/31").await.unwrap();
        let spine_intf: Interface = client.get("fra05-pod1-spine1-Ethernet1").await.unwrap();
        assert_eq!(spine_ip.interface, Some(spine_intf.id));
        assert!(leaf_ip.interface.is_some());

        let leaf: Device = client.get("fra05-pod1-leaf1").await.unwrap();
        let primary: IpAddress = client.get_by_id(leaf.primary_address.unwrap()).await.unwrap();
        assert_eq!(primary.address.prefix(), 24);
        assert!("10.1.0.0/24".parse::<Ipv4Network>().unwrap().contains(primary.address.ip()));
    }

    #[tokio::test]
    async fn test_asns_shared_by_spines_and_pairs() {
        let client = seeded().await;
        generate(&client, "fra05-pod1").await;

        let spine1: Device = client.get("fra05-pod1-spine1").await.unwrap();
        let spine2: Device = client.get("fra05-pod1-spine2").await.unwrap();
        let leaf1: Device = client.get("fra05-pod1-leaf1").await.unwrap();
        let leaf2: Device = client.get("fra05-pod1-leaf2").await.unwrap();
        assert_eq!(spine1.asn, spine2.asn);
        assert_eq!(leaf1.asn, leaf2.asn);
        assert_ne!(spine1.asn, leaf1.asn);

        let spine_as: AutonomousSystem = client.get_by_id(spine1.asn).await.unwrap();
        let leaf_as: AutonomousSystem = client.get_by_id(leaf1.asn).await.unwrap();
        assert_eq!(spine_as.asn, 65100);
        assert_eq!(leaf_as.asn, 65111);
    }

    #[tokio::test]
    async fn test_bgp_sessions_reference_each_other() {
        let client = seeded().await;
        generate(&client, "fra05-pod1").await;

        let sessions = client.all::<BgpSession>().await.unwrap();
        assert_eq!(sessions.len(), 8);
        for session in &sessions {
            let peer: BgpSession = client.get_by_id(session.peer_session.unwrap()).await.unwrap();
            assert_eq!(peer.peer_session, Some(session.id));
            assert_eq!(peer.local_as, session.remote_as);
            assert_eq!(peer.local_ip, session.remote_ip);
        }

        let spine: BgpSession = client.get("spine-10.1.1.0/31").await.unwrap();
        assert_eq!(spine.description, "ethernet1.fra05-pod1-spine1 to ethernet10.fra05-pod1-leaf1");
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let client = seeded().await;
        generate(&client, "fra05-pod1").await;
        let devices: Vec<Uuid> = client.all::<Device>().await.unwrap().iter().map(|d| d.id).collect();
        let interfaces: Vec<Uuid> = client.all::<Interface>().await.unwrap().iter().map(|i| i.id).collect();

        let reports = generate(&client, "fra05-pod1").await;
        assert_eq!(reports[0].links.len(), 4);

        let devices_again: Vec<Uuid> = client.all::<Device>().await.unwrap().iter().map(|d| d.id).collect();
        let interfaces_again: Vec<Uuid> = client.all::<Interface>().await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(devices, devices_again);
        assert_eq!(interfaces, interfaces_again);
        assert_eq!(client.all::<BgpSession>().await.unwrap().len(), 8);
        assert_eq!(client.all::<AutonomousSystem>().await.unwrap().len(), 3);

        let intf: Interface = client.get("fra05-pod1-spine1-Ethernet1").await.unwrap();
        assert_eq!(intf.description, "ethernet1.fra05-pod1-spine1 to ethernet10.fra05-pod1-leaf1");
    }

    #[tokio::test]
    async fn test_border_leaves_use_spine_uplinks() {
        let client = seeded().await;
        let reports = generate(&client, "de2-pod1").await;
        let report = &reports[0];

        // 4 leaves and 2 border leaves against 2 spines
        assert_eq!(report.links.len(), 12);
        let border: Vec<&LinkReport> = report.links.iter().filter(|l| l.leaf.contains("borderleaf")).collect();
        assert_eq!(border.len(), 4);
        assert!(border.iter().all(|l| l.spine_port == "Ethernet11" || l.spine_port == "Ethernet12"));

        // ospf underlay: no eBGP sessions, devices share the internal AS
        assert!(report.bgp_sessions.is_empty());
        let internal: AutonomousSystem = client.get("AS65000").await.unwrap();
        let leaf: Device = client.get("de2-pod1-borderleaf1").await.unwrap();
        assert_eq!(leaf.asn, internal.id);

        // Loopback, VTEP and management interfaces carry the element MTU
        for name in ["Loopback0", "Loopback1", "Management0"] {
            let intf: Interface = client.get(&format!("de2-pod1-spine1-{}", name)).await.unwrap();
            assert_eq!(intf.mtu, Some(9192), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_topology_without_fabric_ports_stops_early() {
        let client = seeded().await;
        let reports = generate(&client, "denver-mpls1").await;
        assert!(reports.is_empty());
        // Devices are still synthesized before cabling gives up
        let device: Device = client.get("denver-mpls1-borderp_router1").await.unwrap();
        assert!(device.primary_address.is_some());
    }

    #[tokio::test]
    async fn test_topology_without_location_stops_early() {
        let client = seeded().await;
        let mut topology: Topology = client.get("fra05-pod1").await.unwrap();
        topology.location = None;
        client.save(&topology).await.unwrap();
        assert!(generate(&client, "fra05-pod1").await.is_empty());
    }

    async fn clone_topology(client: &GraphClient, from: &str, to: &str) {
        let source: Topology = client.get(from).await.unwrap();
        let copy = Topology {
            id: Uuid::new_v4(),
            name: to.to_string(),
            ..source.clone()
        };
        client.save(&copy).await.unwrap();
        for element in client.filters::<TopologyElement, _>(|e| e.topology == source.id).await.unwrap() {
            let element = TopologyElement {
                id: Uuid::new_v4(),
                name: element.name.replace(from, to),
                topology: copy.id,
                ..element
            };
            client.save(&element).await.unwrap();
        }
    }

    async fn resize_prefix(client: &GraphClient, from: &str, to: &str) {
        let mut prefix: Prefix = client.get(from).await.unwrap();
        prefix.prefix = to.parse().unwrap();
        client.save(&prefix).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_topology_on_location_keeps_first_addresses() {
        let client = seeded().await;
        clone_topology(&client, "fra05-pod1", "fra05-pod2").await;

        let first = generate(&client, "fra05-pod1").await;
        let second = generate(&client, "fra05-pod2").await;
        assert_eq!(second[0].links.len(), 4);

        let first_subnets: HashSet<Ipv4Network> = first[0].links.iter().map(|l| l.subnet).collect();
        assert!(second[0].links.iter().all(|l| !first_subnets.contains(&l.subnet)));
        assert_eq!(second[0].links[0].subnet, "10.1.1.8/31".parse::<Ipv4Network>().unwrap());
        assert_eq!(client.all::<BgpSession>().await.unwrap().len(), 16);

        let link_ip: IpAddress = client.get("10.1.1.0/31").await.unwrap();
        let link_intf: Interface = client.get_by_id(link_ip.interface.unwrap()).await.unwrap();
        assert_eq!(link_intf.device_name, "fra05-pod1-spine1");

        let spine: Device = client.get("fra05-pod1-spine1").await.unwrap();
        let primary: IpAddress = client.get_by_id(spine.primary_address.unwrap()).await.unwrap();
        let mgmt: Interface = client.get_by_id(primary.interface.unwrap()).await.unwrap();
        assert_eq!(mgmt.device, spine.id);

        let other: Device = client.get("fra05-pod2-spine1").await.unwrap();
        let other_primary: IpAddress = client.get_by_id(other.primary_address.unwrap()).await.unwrap();
        assert_eq!(other_primary.address, "10.1.0.5/24".parse::<Ipv4Network>().unwrap());

        // Re-running the first topology keeps its own addressing
        let again = generate(&client, "fra05-pod1").await;
        let subnets = |r: &GenerationReport| r.links.iter().map(|l| l.subnet).collect::<Vec<_>>();
        assert_eq!(subnets(&again[0]), subnets(&first[0]));
        assert_eq!(client.all::<BgpSession>().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_addresses_point_back_to_their_devices() {
        let client = seeded().await;
        clone_topology(&client, "fra05-pod1", "fra05-pod2").await;
        generate(&client, "fra05-pod2").await;
        let reports = tokio_test::assert_ok!(generate_all(&client, &GeneratorSettings::default(), None).await);
        assert_eq!(reports.len(), 4);

        let interfaces: HashMap<Uuid, Interface> = client
            .all::<Interface>()
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let addresses = client.all::<IpAddress>().await.unwrap();

        for device in client.all::<Device>().await.unwrap() {
            let primary: IpAddress = client.get_by_id(device.primary_address.unwrap()).await.unwrap();
            assert_eq!(interfaces[&primary.interface.unwrap()].device, device.id, "{}", device.name);

            let own = interfaces.values().filter(|i| {
                i.device == device.id && matches!(i.role, InterfaceRole::Loopback | InterfaceRole::Management)
            });
            for intf in own {
                let held = addresses.iter().filter(|a| a.interface == Some(intf.id)).count();
                assert_eq!(held, 1, "{}-{}", device.name, intf.name);
            }
        }

        // Every link address sits on one of the two ends of its link
        for report in &reports {
            for link in &report.links {
                let ip: IpAddress = client.get(&Ipv4Network::new(link.subnet.network(), 31).unwrap().to_string()).await.unwrap();
                assert_eq!(interfaces[&ip.interface.unwrap()].device_name, link.spine);
            }
        }
    }

    #[tokio::test]
    async fn test_exhausted_technical_pool_stops_cabling() {
        let client = seeded().await;
        resize_prefix(&client, "10.1.1.0/24", "10.1.1.0/30").await;

        let reports = generate(&client, "fra05-pod1").await;
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.devices.len(), 4);
        assert_eq!(report.links.len(), 2);
        assert_eq!(report.errors, vec!["No /31 subnet left in fra05-technical (10.1.1.0/30)".to_string()]);
        assert_eq!(report.bgp_sessions.len(), 4);
        assert_eq!(report.peer_links.len(), 2);

        let uncabled: Interface = client.get("fra05-pod1-leaf2-Ethernet10").await.unwrap();
        assert_eq!(uncabled.status, InterfaceStatus::Provisioning);
    }

    #[tokio::test]
    async fn test_exhausted_loopback_pool_skips_devices() {
        let client = seeded().await;
        resize_prefix(&client, "10.1.2.0/24", "10.1.2.0/30").await;

        let reports = generate(&client, "fra05-pod1").await;
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.devices, vec!["fra05-pod1-spine1", "fra05-pod1-spine2"]);
        assert!(report.links.is_empty());
        assert_eq!(
            report.errors[..2],
            [
                "fra05-pod1-leaf1: Address pool fra05-loopback (10.1.2.0/30) is exhausted".to_string(),
                "fra05-pod1-leaf2: Address pool fra05-loopback (10.1.2.0/30) is exhausted".to_string(),
            ]
        );
        assert!(client.find::<Device>("fra05-pod1-leaf1").await.unwrap().is_none());

        let lo: Prefix = client.get("10.1.2.0/30").await.unwrap();
        assert_eq!(lo.role, PrefixRole::Loopback);
    }
}
