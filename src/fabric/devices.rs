use anyhow::Result;
use ipnetwork::Ipv4Network;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use uuid::Uuid;

use super::asn::{element_index, generate_asn};
use super::cabling::FabricPorts;
use super::catalog::{DeviceModel, InterfaceCatalog, PortLayout};
use super::pools::CapacityError;
use super::TopologyRun;
use crate::db::{Batch, SaveOptions};
use crate::models::{
    interface_description, AutonomousSystem, Device, DeviceRole, DeviceStatus, DeviceType, Group, Interface,
    InterfaceLayer, InterfaceRole, InterfaceStatus, IpAddress, L2Mode, Platform, Prefix, TopologyElement,
};

const DEFAULT_SPEED: u32 = 1000;

/// Everything needed to stamp out the devices of one element
struct ElementSpec<'e> {
    element: &'e TopologyElement,
    type_index: u32,
    device_type: DeviceType,
    platform: Platform,
    catalog: &'static InterfaceCatalog,
    layout: Option<PortLayout>,
}

/// Host addresses drawn for one device before anything is created
struct DeviceAddresses {
    loopback: Ipv4Addr,
    vtep: Ipv4Addr,
    management: Ipv4Addr,
}

pub(super) fn new_ip_address(prefix: &Prefix, interface: &Interface, address: Ipv4Network, description: String) -> IpAddress {
    IpAddress {
        id: Uuid::new_v4(),
        address,
        description,
        namespace: prefix.namespace.clone(),
        interface: Some(interface.id),
        prefix: Some(prefix.id),
        vrf: prefix.vrf,
    }
}

fn new_interface(
    device: &Device,
    name: &str,
    role: InterfaceRole,
    status: InterfaceStatus,
    mtu: Option<u32>,
    existing: &HashMap<String, Uuid>,
) -> Interface {
    Interface {
        id: existing.get(name).copied().unwrap_or_else(Uuid::new_v4),
        device: device.id,
        device_name: device.name.clone(),
        name: name.to_string(),
        role,
        layer: role.layer(),
        status,
        description: interface_description(name, &device.name),
        enabled: true,
        speed: DEFAULT_SPEED,
        mtu,
        l2_mode: None,
        untagged_vlan: None,
        tagged_vlans: Vec::new(),
        connected_endpoint: None,
    }
}

impl TopologyRun<'_> {
    /// Create the devices of every element, in element order, and collect
    /// the port lists the cabling step needs.
    pub(super) async fn synthesize_devices(&mut self, elements: &[TopologyElement]) -> Result<FabricPorts> {
        let mut ports = FabricPorts::default();

        for (type_index, element) in elements.iter().enumerate() {
            let Some(spec) = self.resolve_element(element, type_index as u32).await? else {
                continue;
            };

            if let Some(layout) = &spec.layout {
                match element.device_role {
                    DeviceRole::Spine => {
                        ports.spine_quantity = element.quantity;
                        ports.spine_leaf = layout.ports_with_role(InterfaceRole::Leaf);
                        ports.spine_uplink = layout.ports_with_role(InterfaceRole::Uplink);
                    }
                    _ if element.is_border_leaf() => {
                        ports.border_leaf_quantity = element.quantity;
                        ports.border_leaf_uplink = layout.ports_with_role(InterfaceRole::Uplink);
                        ports.border_leaf_peer = layout.ports_with_role(InterfaceRole::Peer);
                    }
                    DeviceRole::Leaf => {
                        ports.leaf_quantity = element.quantity;
                        ports.leaf_uplink = layout.ports_with_role(InterfaceRole::Uplink);
                        ports.leaf_peer = layout.ports_with_role(InterfaceRole::Peer);
                    }
                    _ => {}
                }
            }

            let mut batch = self.client.create_batch();
            for index in 1..=element.quantity {
                self.synthesize_device(&spec, index, &mut batch).await?;
            }
            let summary = batch.drain().await;
            tracing::debug!(
                "Element {}: {} deferred saves, {} failed",
                element.name,
                summary.created,
                summary.failed
            );
        }
        Ok(ports)
    }

    async fn resolve_element<'e>(
        &self,
        element: &'e TopologyElement,
        type_index: u32,
    ) -> Result<Option<ElementSpec<'e>>> {
        let Some(device_type_id) = element.device_type else {
            tracing::warn!("Element {} of {} has no device type, skipping", element.name, self.topology.name);
            return Ok(None);
        };
        let device_type: DeviceType = self.client.get_by_id(device_type_id).await?;

        let Some(platform_id) = device_type.platform else {
            tracing::error!("Device type {} has no platform, skipping {}", device_type.name, element.name);
            return Ok(None);
        };
        let platform: Platform = self.client.get_by_id(platform_id).await?;

        let Some(model) = DeviceModel::from_name(&device_type.name) else {
            tracing::warn!(
                "No interface catalog for device type {}, skipping {}",
                device_type.name,
                element.name
            );
            return Ok(None);
        };

        Ok(Some(ElementSpec {
            element,
            type_index,
            device_type,
            platform,
            catalog: model.catalog(),
            layout: PortLayout::for_model(model, element.device_role),
        }))
    }

    fn draw_addresses(&mut self) -> Result<DeviceAddresses, CapacityError> {
        Ok(DeviceAddresses {
            loopback: self.pools.loopback.allocator.next()?,
            vtep: self.pools.vtep.allocator.next()?,
            management: self.pools.management.allocator.next()?,
        })
    }

    async fn resolve_asn(&mut self, spec: &ElementSpec<'_>, index: u32, device_name: &str) -> Result<AutonomousSystem> {
        if !self.uses_ebgp() {
            return Ok(self.internal_as.clone());
        }
        let asn = generate_asn(
            self.topology_index,
            spec.type_index,
            element_index(spec.element.device_role, index),
        );
        let name = AutonomousSystem::name_for(asn);
        if let Some(existing) = self.cache.get::<AutonomousSystem>(&name) {
            return Ok(existing);
        }

        let node = AutonomousSystem {
            id: Uuid::new_v4(),
            description: Some(format!("Private {} for {} on device {}", name, self.tenant.name, device_name)),
            name,
            asn,
            organization: Some(self.tenant.id),
        };
        let created = self.client.create_and_save(node, SaveOptions::create_or_retrieve()).await?;
        self.cache.set(&created);
        Ok(created)
    }

    async fn add_to_group(&mut self, name: &str, member: Uuid) -> Result<()> {
        let mut group = match self.cache.get::<Group>(name) {
            Some(group) => group,
            None => self
                .client
                .find::<Group>(name)
                .await?
                .unwrap_or_else(|| Group::new(name)),
        };
        if group.add_member(member) {
            let group = self.client.save(&group).await?;
            tracing::debug!("- Added {} to group {}", member, group.name);
            self.cache.set(&group);
        }
        Ok(())
    }

    async fn synthesize_device(&mut self, spec: &ElementSpec<'_>, index: u32, batch: &mut Batch) -> Result<()> {
        let name = spec.element.device_name(&self.topology.name, index);

        let addresses = match self.draw_addresses() {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::error!("Skipping device {}: {}", name, e);
                self.report.errors.push(format!("{}: {}", name, e));
                return Ok(());
            }
        };

        let asn = self.resolve_asn(spec, index, &name).await?;

        let device = Device {
            id: Uuid::new_v4(),
            name,
            location: self.location.id,
            role: spec.element.device_role,
            device_type: spec.device_type.id,
            platform: spec.platform.id,
            asn: asn.id,
            topology: self.topology.id,
            status: DeviceStatus::Active,
            primary_address: None,
        };
        let mut device = self.client.create_and_save(device, SaveOptions::default()).await?;

        self.add_to_group(&spec.platform.group_name(), device.id).await?;
        let topology_group = self.topology.group_name();
        self.add_to_group(&topology_group, device.id).await?;

        let existing: HashMap<String, Uuid> = self
            .client
            .filters::<Interface, _>(|i| i.device == device.id)
            .await?
            .into_iter()
            .map(|i| (i.name, i.id))
            .collect();

        // Loopback and VTEP addresses are deferred to the batch
        let loopback = new_interface(
            &device,
            spec.catalog.loopback,
            InterfaceRole::Loopback,
            InterfaceStatus::Active,
            Some(spec.element.mtu),
            &existing,
        );
        let loopback = self.client.create_and_save(loopback, SaveOptions::default()).await?;
        let ip = new_ip_address(
            &self.pools.loopback.prefix,
            &loopback,
            Ipv4Network::new(addresses.loopback, 32)?,
            loopback.description.clone(),
        );
        batch.add(&ip, true)?;

        let vtep = new_interface(
            &device,
            spec.catalog.vtep,
            InterfaceRole::Loopback,
            InterfaceStatus::Active,
            Some(spec.element.mtu),
            &existing,
        );
        let vtep = self.client.create_and_save(vtep, SaveOptions::default()).await?;
        let ip = new_ip_address(
            &self.pools.vtep.prefix,
            &vtep,
            Ipv4Network::new(addresses.vtep, 32)?,
            vtep.description.clone(),
        );
        batch.add(&ip, true)?;

        let mgmt = new_interface(
            &device,
            spec.catalog.management,
            InterfaceRole::Management,
            InterfaceStatus::Active,
            Some(spec.element.mtu),
            &existing,
        );
        let mgmt = self.client.create_and_save(mgmt, SaveOptions::default()).await?;
        let mgmt_prefix = &self.pools.management.prefix;
        let ip = new_ip_address(
            mgmt_prefix,
            &mgmt,
            Ipv4Network::new(addresses.management, mgmt_prefix.prefix.prefix())?,
            mgmt.description.clone(),
        );
        let ip = self.client.create_and_save(ip, SaveOptions::default()).await?;

        device.primary_address = Some(ip.id);
        let device = self.client.save(&device).await?;
        tracing::info!("- Set {} as primary address of {}", ip.address, device.name);
        self.cache.set(&device);
        self.report.devices.push(device.name.clone());

        let Some(layout) = &spec.layout else {
            return Ok(());
        };
        for (port, role) in layout.iter() {
            let mut intf = new_interface(
                &device,
                port,
                role,
                InterfaceStatus::Provisioning,
                Some(spec.element.mtu),
                &existing,
            );
            if intf.layer == InterfaceLayer::L2 {
                intf.l2_mode = Some(L2Mode::Access);
                intf.untagged_vlan = self.vlan_pxe.as_ref().map(|v| v.id);
                intf.tagged_vlans = self.vlans_server.iter().map(|v| v.id).collect();
            }
            batch.add(&intf, true)?;
            self.cache.set(&intf);
        }
        Ok(())
    }
}
