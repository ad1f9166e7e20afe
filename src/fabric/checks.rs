use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::db::GraphClient;
use crate::models::{Device, DeviceType, Group, Topology, TopologyElement};

/// role -> device type name -> device count
type RoleCounts = BTreeMap<String, BTreeMap<String, u32>>;

/// Compare the element plan of a topology with the devices that are
/// members of its `<topology>_topology` group. Returns one message per
/// finding; an empty list means the topology is consistent.
pub async fn check_device_topology(client: &GraphClient, topology: &Topology) -> Result<Vec<String>> {
    let mut findings = Vec::new();

    let group_name = topology.group_name();
    let Some(group) = client.find::<Group>(&group_name).await? else {
        findings.push(format!("No corresponding group found for topology {}.", topology.name));
        return Ok(findings);
    };

    let type_names: HashMap<Uuid, String> = client
        .all::<DeviceType>()
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    let mut expected = RoleCounts::new();
    let elements = client
        .filters::<TopologyElement, _>(|e| e.topology == topology.id)
        .await?;
    for element in elements {
        let Some(type_name) = element.device_type.and_then(|id| type_names.get(&id)) else {
            continue;
        };
        expected
            .entry(element.device_role.to_string())
            .or_default()
            .insert(type_name.clone(), element.quantity);
    }

    let devices: HashMap<Uuid, Device> = client
        .all::<Device>()
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();
    let mut actual = RoleCounts::new();
    for device in group.members.iter().filter_map(|id| devices.get(id)) {
        let Some(type_name) = type_names.get(&device.device_type) else {
            continue;
        };
        *actual
            .entry(device.role.to_string())
            .or_default()
            .entry(type_name.clone())
            .or_default() += 1;
    }

    let empty = BTreeMap::new();
    for (role, expected_types) in &expected {
        let actual_types = actual.get(role).unwrap_or(&empty);
        for (expected_type, &expected_count) in expected_types {
            let actual_count = actual_types.get(expected_type).copied().unwrap_or(0);

            if expected_count % 2 != 0 {
                findings.push(format!(
                    "{} has an odd number of Elements for role {}. Expected: {}",
                    topology.name, role, expected_count
                ));
            }
            if actual_count > 0 && expected_count != actual_count {
                findings.push(format!(
                    "{} has mismatched quantity of {} devices with role {}. Expected: {}, Actual: {}",
                    topology.name, expected_type, role, expected_count, actual_count
                ));
            }
            let unexpected: Vec<&str> = actual_types
                .keys()
                .filter(|t| *t != expected_type)
                .map(String::as_str)
                .collect();
            if !actual_types.contains_key(expected_type) && !unexpected.is_empty() {
                findings.push(format!(
                    "{} expected {} devices with role {}, but found different type(s): {}.",
                    topology.name,
                    expected_type,
                    role,
                    unexpected.join(", ")
                ));
            }
        }
    }

    for finding in &findings {
        tracing::error!("{}", finding);
    }
    Ok(findings)
}

/// Run [`check_device_topology`] for every topology, or only `name`
pub async fn check_all_topologies(client: &GraphClient, name: Option<&str>) -> Result<BTreeMap<String, Vec<String>>> {
    let mut results = BTreeMap::new();
    for topology in client.all::<Topology>().await? {
        if name.is_some_and(|n| n != topology.name) {
            continue;
        }
        let findings = check_device_topology(client, &topology).await?;
        if findings.is_empty() {
            tracing::info!("Topology {} matches its devices", topology.name);
        }
        results.insert(topology.name, findings);
    }
    Ok(results)
}
