use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::collections::HashMap;
use uuid::Uuid;

use super::{GraphClient, SaveOptions};
use crate::config::GeneratorSettings;
use crate::fabric::pools::{carve_location_prefixes, CARVED_ROLES};
use crate::models::*;

const MANAGEMENT_VRF: &str = "Management";

struct SeedDeviceType {
    name: &'static str,
    manufacturer: &'static str,
    platform: &'static str,
}

struct SeedLocation {
    name: &'static str,
    shortname: &'static str,
    supernet: &'static str,
}

struct SeedElement {
    quantity: u32,
    role: DeviceRole,
    device_type: &'static str,
    mtu: u32,
    mlag_support: bool,
    border: bool,
}

struct SeedTopology {
    name: &'static str,
    description: &'static str,
    location: &'static str,
    strategy: &'static str,
    elements: &'static [SeedElement],
}

const PLATFORMS: &[&str] = &["Cisco IOS-XE", "Cisco IOS-XR", "Juniper JunOS", "Arista EOS", "Linux"];

const DEVICE_TYPES: &[SeedDeviceType] = &[
    SeedDeviceType { name: "MX204", manufacturer: "Juniper", platform: "Juniper JunOS" },
    SeedDeviceType { name: "QFX5110-48S-S", manufacturer: "Juniper", platform: "Juniper JunOS" },
    SeedDeviceType { name: "CCS-720DP-48S-2F", manufacturer: "Arista", platform: "Arista EOS" },
    SeedDeviceType { name: "DCS-7280DR3-24-F", manufacturer: "Arista", platform: "Arista EOS" },
    SeedDeviceType { name: "NCS-5501-SE", manufacturer: "Cisco", platform: "Cisco IOS-XR" },
    SeedDeviceType { name: "ASR1002-HX", manufacturer: "Cisco", platform: "Cisco IOS-XR" },
];

const STRATEGIES: &[(&str, Underlay, Overlay)] = &[
    ("ebgp-ebgp", Underlay::Ebgp, Overlay::Ebgp),
    ("ospf-ebgp", Underlay::Ospf, Overlay::Ebgp),
    ("isis-ebgp", Underlay::Isis, Overlay::Ebgp),
    ("ospf-ibgp", Underlay::Ospf, Overlay::Ibgp),
    ("isis-ibgp", Underlay::Isis, Overlay::Ibgp),
];

const LOCATIONS: &[SeedLocation] = &[
    SeedLocation { name: "Equinix FRA05", shortname: "FRA05", supernet: "10.1.0.0/16" },
    SeedLocation { name: "Equinix DE1", shortname: "DE1", supernet: "10.2.0.0/16" },
    SeedLocation { name: "Equinix DE2", shortname: "DE2", supernet: "10.3.0.0/16" },
    SeedLocation { name: "Denver Metro", shortname: "DEN", supernet: "10.4.0.0/16" },
];

// (offset in the location range, name suffix)
const VLANS: &[(u16, &str)] = &[(0, "server-pxe"), (1, "server-a"), (2, "server-b"), (99, "management")];

const TOPOLOGIES: &[SeedTopology] = &[
    SeedTopology {
        name: "fra05-pod1",
        description: "Small Fabric in Equinix FRA05",
        location: "FRA05",
        strategy: "ebgp-ebgp",
        elements: &[
            SeedElement { quantity: 2, role: DeviceRole::Spine, device_type: "CCS-720DP-48S-2F", mtu: 1500, mlag_support: false, border: false },
            SeedElement { quantity: 2, role: DeviceRole::Leaf, device_type: "CCS-720DP-48S-2F", mtu: 1500, mlag_support: true, border: false },
        ],
    },
    SeedTopology {
        name: "de1-pod1",
        description: "Medium Fabric in Equinix DE1",
        location: "DE1",
        strategy: "ebgp-ebgp",
        elements: &[
            SeedElement { quantity: 2, role: DeviceRole::Spine, device_type: "CCS-720DP-48S-2F", mtu: 9192, mlag_support: false, border: true },
            SeedElement { quantity: 4, role: DeviceRole::Leaf, device_type: "NCS-5501-SE", mtu: 9192, mlag_support: true, border: false },
        ],
    },
    SeedTopology {
        name: "de2-pod1",
        description: "Medium Fabric in Equinix DE2",
        location: "DE2",
        strategy: "ospf-ibgp",
        elements: &[
            SeedElement { quantity: 2, role: DeviceRole::Spine, device_type: "CCS-720DP-48S-2F", mtu: 9192, mlag_support: false, border: false },
            SeedElement { quantity: 4, role: DeviceRole::Leaf, device_type: "NCS-5501-SE", mtu: 9192, mlag_support: true, border: false },
            SeedElement { quantity: 2, role: DeviceRole::Leaf, device_type: "CCS-720DP-48S-2F", mtu: 9192, mlag_support: true, border: true },
        ],
    },
    SeedTopology {
        name: "denver-mpls1",
        description: "Medium MPLS in Denver Metro (DE1+DE2)",
        location: "DEN",
        strategy: "isis-ibgp",
        elements: &[
            SeedElement { quantity: 2, role: DeviceRole::RouteReflector, device_type: "DCS-7280DR3-24-F", mtu: 9192, mlag_support: false, border: false },
            SeedElement { quantity: 4, role: DeviceRole::PeRouter, device_type: "DCS-7280DR3-24-F", mtu: 9192, mlag_support: true, border: false },
            SeedElement { quantity: 2, role: DeviceRole::PRouter, device_type: "DCS-7280DR3-24-F", mtu: 9192, mlag_support: true, border: true },
        ],
    },
];

fn title(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Populate the demo inventory. Every object is upserted by its
/// business key, so running this again leaves the store unchanged.
pub async fn seed(client: &GraphClient, settings: &GeneratorSettings) -> Result<()> {
    tracing::info!("Seeding fabric inventory");
    let upsert = SaveOptions::default();

    let tenant = client
        .create_and_save(
            Organization {
                id: Uuid::new_v4(),
                name: settings.tenant_name.clone(),
                description: Some("Tenant owning the generated fabrics".to_string()),
            },
            upsert,
        )
        .await?;

    let internal_asn: u32 = settings
        .internal_asn_name
        .trim_start_matches("AS")
        .parse()
        .with_context(|| format!("Invalid internal ASN name {}", settings.internal_asn_name))?;
    client
        .create_and_save(
            AutonomousSystem {
                id: Uuid::new_v4(),
                name: settings.internal_asn_name.clone(),
                asn: internal_asn,
                organization: Some(tenant.id),
                description: Some(format!("Internal AS for {}", tenant.name)),
            },
            upsert,
        )
        .await?;

    let backbone = client
        .create_and_save(
            Vrf { id: Uuid::new_v4(), name: settings.backbone_vrf.clone(), description: None },
            upsert,
        )
        .await?;
    let management = client
        .create_and_save(
            Vrf { id: Uuid::new_v4(), name: MANAGEMENT_VRF.to_string(), description: None },
            upsert,
        )
        .await?;

    let mut platforms = HashMap::new();
    for name in PLATFORMS {
        let platform = client
            .create_and_save(Platform { id: Uuid::new_v4(), name: name.to_string(), description: None }, upsert)
            .await?;
        seed_group(client, &platform.group_name(), format!("Devices running {}", platform.name)).await?;
        platforms.insert(*name, platform.id);
    }

    let mut device_types = HashMap::new();
    for seed in DEVICE_TYPES {
        let device_type = DeviceType {
            id: Uuid::new_v4(),
            name: seed.name.to_string(),
            manufacturer: Some(seed.manufacturer.to_string()),
            platform: platforms.get(seed.platform).copied(),
        };
        let device_type = client.create_and_save(device_type, upsert).await?;
        device_types.insert(seed.name, device_type.id);
    }

    let mut strategies = HashMap::new();
    for (name, underlay, overlay) in STRATEGIES {
        let strategy = Strategy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(format!(
                "Using {} as underlay with {} as overlay",
                format!("{:?}", underlay).to_uppercase(),
                format!("{:?}", overlay).to_uppercase()
            )),
            underlay: *underlay,
            overlay: *overlay,
        };
        let strategy = client.create_and_save(strategy, upsert).await?;
        strategies.insert(*name, strategy.id);
    }

    let mut locations = HashMap::new();
    for (idx, seed) in LOCATIONS.iter().enumerate() {
        let location = seed_location(client, seed, idx as u16, &tenant, &backbone, &management).await?;
        locations.insert(seed.shortname, location.id);
    }

    for seed in TOPOLOGIES {
        let topology = Topology {
            id: Uuid::new_v4(),
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            strategy: strategies.get(seed.strategy).copied(),
            location: locations.get(seed.location).copied(),
        };
        let topology = client.create_and_save(topology, upsert).await?;
        seed_group(client, &topology.group_name(), format!("Devices of topology {}", topology.name)).await?;

        for element in seed.elements {
            let role = element.role.as_str();
            let (name, description) = if element.border && element.role != DeviceRole::Spine {
                (
                    format!("border-{}-{}", role, topology.name.to_lowercase()),
                    format!("Border {} for Topology {}", title(role), topology.name),
                )
            } else {
                (
                    format!("{}-{}", role, topology.name.to_lowercase()),
                    format!("{} for Topology {}", title(role), topology.name),
                )
            };
            let node = TopologyElement {
                id: Uuid::new_v4(),
                name,
                description: Some(description),
                topology: topology.id,
                device_role: element.role,
                device_type: device_types.get(element.device_type).copied(),
                quantity: element.quantity,
                mtu: element.mtu,
                mlag_support: element.mlag_support,
                border: element.border,
            };
            client.create_and_save(node, upsert).await?;
        }
    }

    tracing::info!("Seeding complete");
    Ok(())
}

/// Create a group unless it exists; members of an existing group are kept
async fn seed_group(client: &GraphClient, name: &str, description: String) -> Result<Group> {
    if let Some(group) = client.find::<Group>(name).await? {
        return Ok(group);
    }
    let mut group = Group::new(name);
    group.description = Some(description);
    client.create_and_save(group, SaveOptions::default()).await
}

async fn seed_location(
    client: &GraphClient,
    seed: &SeedLocation,
    idx: u16,
    tenant: &Organization,
    backbone: &Vrf,
    management: &Vrf,
) -> Result<Location> {
    let supernet: Ipv4Network = seed
        .supernet
        .parse()
        .with_context(|| format!("Invalid supernet for {}", seed.shortname))?;
    let location = Location {
        id: Uuid::new_v4(),
        name: seed.name.to_string(),
        shortname: seed.shortname.to_string(),
        supernet: Some(supernet),
    };
    let location = client.create_and_save(location, SaveOptions::default()).await?;
    let loc = location.shortname.to_lowercase();

    let base = (idx + 1) * 100;
    for (offset, suffix) in VLANS {
        let role = match suffix.split('-').next() {
            Some("management") => VlanRole::Management,
            _ => VlanRole::Server,
        };
        let vlan = Vlan {
            id: Uuid::new_v4(),
            name: format!("{}_{}", loc, suffix),
            vlan_id: base + offset,
            role,
            location: Some(location.id),
        };
        client.create_and_save(vlan, SaveOptions::default()).await?;
    }

    let supernet_prefix = Prefix {
        id: Uuid::new_v4(),
        prefix: supernet,
        description: format!("{}-supernet", loc),
        role: PrefixRole::Supernet,
        status: PrefixStatus::Active,
        namespace: DEFAULT_NAMESPACE.to_string(),
        location: Some(location.id),
        vrf: Some(backbone.id),
        organization: Some(tenant.id),
    };
    client.create_and_save(supernet_prefix, SaveOptions::default()).await?;

    let existing = client
        .filters::<Prefix, _>(|p| p.location == Some(location.id) && p.role != PrefixRole::Supernet)
        .await?;
    if CARVED_ROLES.iter().all(|role| existing.iter().any(|p| p.role == *role)) {
        tracing::debug!("{} prefixes already carved", location.shortname);
        return Ok(location);
    }

    let consumed: Vec<Ipv4Network> = existing.iter().map(|p| p.prefix).collect();
    let carved = carve_location_prefixes(&location.shortname, supernet, &consumed)?;
    for (role, network) in carved {
        let (vrf, status) = match role {
            PrefixRole::Management => (management.id, PrefixStatus::Active),
            _ => (backbone.id, PrefixStatus::Reserved),
        };
        let prefix = Prefix {
            id: Uuid::new_v4(),
            prefix: network,
            description: format!("{}-{}", loc, role),
            role,
            status,
            namespace: DEFAULT_NAMESPACE.to_string(),
            location: Some(location.id),
            vrf: Some(vrf),
            organization: Some(tenant.id),
        };
        client.create_and_save(prefix, SaveOptions::default()).await?;
    }
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::Arc;

    async fn seeded() -> GraphClient {
        let client = GraphClient::new(Arc::new(MemoryStore::new()), 4);
        seed(&client, &GeneratorSettings::default()).await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_seed_inventory() {
        let client = seeded().await;
        assert_eq!(client.all::<Topology>().await.unwrap().len(), 4);
        assert_eq!(client.all::<TopologyElement>().await.unwrap().len(), 10);
        assert_eq!(client.all::<Strategy>().await.unwrap().len(), 5);

        let asn: AutonomousSystem = client.get("AS65000").await.unwrap();
        assert_eq!(asn.asn, 65000);

        let groups: Vec<String> = client.all::<Group>().await.unwrap().into_iter().map(|g| g.name).collect();
        assert!(groups.contains(&"arista_devices".to_string()));
        assert!(groups.contains(&"cisco_devices".to_string()));
        assert!(groups.contains(&"fra05-pod1_topology".to_string()));

        let border: TopologyElement = client.get("border-leaf-de2-pod1").await.unwrap();
        assert!(border.border);
        assert_eq!(border.description.as_deref(), Some("Border Leaf for Topology de2-pod1"));
    }

    #[tokio::test]
    async fn test_seed_carves_location_prefixes() {
        let client = seeded().await;
        let fra05: Location = client.get("FRA05").await.unwrap();
        let mut prefixes = client
            .filters::<Prefix, _>(|p| p.location == Some(fra05.id))
            .await
            .unwrap();
        prefixes.sort_by_key(|p| (u32::from(p.prefix.network()), p.prefix.prefix()));
        let summary: Vec<(String, PrefixRole)> = prefixes.iter().map(|p| (p.prefix.to_string(), p.role)).collect();
        assert_eq!(
            summary,
            vec![
                ("10.1.0.0/16".to_string(), PrefixRole::Supernet),
                ("10.1.0.0/24".to_string(), PrefixRole::Management),
                ("10.1.1.0/24".to_string(), PrefixRole::Technical),
                ("10.1.2.0/24".to_string(), PrefixRole::Loopback),
                ("10.1.3.0/24".to_string(), PrefixRole::LoopbackVtep),
            ]
        );

        let pxe: Vlan = client.get("fra05_server-pxe").await.unwrap();
        assert_eq!(pxe.vlan_id, 100);
        let mgmt: Vlan = client.get("de1_management").await.unwrap();
        assert_eq!(mgmt.vlan_id, 299);
        assert_eq!(mgmt.role, VlanRole::Management);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let client = seeded().await;
        let before: Vec<Uuid> = client.all::<Prefix>().await.unwrap().iter().map(|p| p.id).collect();
        seed(&client, &GeneratorSettings::default()).await.unwrap();
        let after: Vec<Uuid> = client.all::<Prefix>().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(before, after);
        assert_eq!(client.all::<Topology>().await.unwrap().len(), 4);
        assert_eq!(client.all::<Vlan>().await.unwrap().len(), 16);
    }
}
