use anyhow::Result;

use crate::db::GraphClient;
use crate::models::Interface;

/// `<intf>.<device>`, followed by ` to <peer intf>.<peer device>` when
/// the interface is cabled. Always lowercase.
pub async fn computed_link_description(client: &GraphClient, interface: &Interface) -> Result<String> {
    let mut description = format!("{}.{}", interface.name, interface.device_name);
    if let Some(endpoint) = interface.connected_endpoint {
        let peer: Interface = client.get_by_id(endpoint).await?;
        description.push_str(&format!(" to {}.{}", peer.name, peer.device_name));
    }
    Ok(description.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{InterfaceLayer, InterfaceRole, InterfaceStatus};
    use std::sync::Arc;
    use uuid::Uuid;

    fn interface(device_name: &str, name: &str) -> Interface {
        Interface {
            id: Uuid::new_v4(),
            device: Uuid::new_v4(),
            device_name: device_name.to_string(),
            name: name.to_string(),
            role: InterfaceRole::Uplink,
            layer: InterfaceLayer::L3,
            status: InterfaceStatus::Active,
            description: String::new(),
            enabled: true,
            speed: 1000,
            mtu: None,
            l2_mode: None,
            untagged_vlan: None,
            tagged_vlans: Vec::new(),
            connected_endpoint: None,
        }
    }

    #[tokio::test]
    async fn test_uncabled_interface() {
        let client = GraphClient::new(Arc::new(MemoryStore::new()), 1);
        let intf = interface("FRA05-POD1-Leaf1", "Ethernet10");
        let description = computed_link_description(&client, &intf).await.unwrap();
        assert_eq!(description, "ethernet10.fra05-pod1-leaf1");
    }

    #[tokio::test]
    async fn test_cabled_interface() {
        let client = GraphClient::new(Arc::new(MemoryStore::new()), 1);
        let peer = client.save(&interface("fra05-pod1-spine1", "Ethernet1")).await.unwrap();
        let mut intf = interface("fra05-pod1-leaf1", "Ethernet10");
        intf.connected_endpoint = Some(peer.id);
        let description = computed_link_description(&client, &intf).await.unwrap();
        assert_eq!(description, "ethernet10.fra05-pod1-leaf1 to ethernet1.fra05-pod1-spine1");
    }
}
