use crate::models::{DeviceRole, InterfaceRole};

/// Device models the generator knows how to wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    Qfx5110,
    Ccs720dp,
    Dcs7280dr3,
    Ncs5501,
    Asr1002,
    Linux,
}

impl DeviceModel {
    pub const ALL: &'static [DeviceModel] = &[
        DeviceModel::Qfx5110,
        DeviceModel::Ccs720dp,
        DeviceModel::Dcs7280dr3,
        DeviceModel::Ncs5501,
        DeviceModel::Asr1002,
        DeviceModel::Linux,
    ];

    /// Device type name as stored in the inventory
    pub fn name(&self) -> &'static str {
        match self {
            DeviceModel::Qfx5110 => "QFX5110-48S-S",
            DeviceModel::Ccs720dp => "CCS-720DP-48S-2F",
            DeviceModel::Dcs7280dr3 => "DCS-7280DR3-24-F",
            DeviceModel::Ncs5501 => "NCS-5501-SE",
            DeviceModel::Asr1002 => "ASR1002-HX",
            DeviceModel::Linux => "linux",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    pub fn catalog(&self) -> &'static InterfaceCatalog {
        match self {
            DeviceModel::Qfx5110 => &QFX5110,
            DeviceModel::Ccs720dp => &CCS720DP,
            DeviceModel::Dcs7280dr3 => &DCS7280DR3,
            DeviceModel::Ncs5501 => &NCS5501,
            DeviceModel::Asr1002 => &ASR1002,
            DeviceModel::Linux => &LINUX,
        }
    }
}

/// Fixed interface names of one device model
#[derive(Debug)]
pub struct InterfaceCatalog {
    pub management: &'static str,
    pub loopback: &'static str,
    pub vtep: &'static str,
    pub ports: &'static [&'static str],
}

const ETHERNET_14: &[&str] = &[
    "Ethernet1", "Ethernet2", "Ethernet3", "Ethernet4", "Ethernet5", "Ethernet6", "Ethernet7",
    "Ethernet8", "Ethernet9", "Ethernet10", "Ethernet11", "Ethernet12", "Ethernet13", "Ethernet14",
];

static QFX5110: InterfaceCatalog = InterfaceCatalog {
    management: "fxp0",
    loopback: "lo0",
    vtep: "lo1",
    ports: &[
        "xe-0/0/0", "xe-0/0/1", "xe-0/0/2", "xe-0/0/3", "xe-0/0/4", "xe-0/0/5", "xe-0/0/6",
        "xe-0/0/7", "xe-0/0/8", "xe-0/0/9", "xe-0/0/10", "xe-0/0/11", "xe-0/0/12", "xe-0/0/13",
    ],
};

static CCS720DP: InterfaceCatalog = InterfaceCatalog {
    management: "Management0",
    loopback: "Loopback0",
    vtep: "Loopback1",
    ports: ETHERNET_14,
};

static DCS7280DR3: InterfaceCatalog = InterfaceCatalog {
    management: "Management1",
    loopback: "Loopback0",
    vtep: "Loopback1",
    ports: ETHERNET_14,
};

static NCS5501: InterfaceCatalog = InterfaceCatalog {
    management: "MgmtEth0/RP0/CPU0/0",
    loopback: "Loopback0",
    vtep: "Loopback1",
    ports: ETHERNET_14,
};

static ASR1002: InterfaceCatalog = InterfaceCatalog {
    management: "GigabitEthernet0",
    loopback: "Loopback 0",
    vtep: "Loopback 1",
    ports: ETHERNET_14,
};

static LINUX: InterfaceCatalog = InterfaceCatalog {
    management: "Eth0",
    loopback: "lo",
    vtep: "lo1",
    ports: &[],
};

// Position i of a role table applies to port i of the model
const SPINE_ROLES: &[InterfaceRole] = &[
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Leaf,
    InterfaceRole::Uplink,
    InterfaceRole::Uplink,
    InterfaceRole::Spare,
    InterfaceRole::Spare,
];

const LEAF_ROLES: &[InterfaceRole] = &[
    InterfaceRole::Server,
    InterfaceRole::Server,
    InterfaceRole::Server,
    InterfaceRole::Server,
    InterfaceRole::Server,
    InterfaceRole::Server,
    InterfaceRole::Spare,
    InterfaceRole::Peer,
    InterfaceRole::Peer,
    InterfaceRole::Uplink,
    InterfaceRole::Uplink,
    InterfaceRole::Uplink,
    InterfaceRole::Uplink,
    InterfaceRole::Spare,
];

/// Ordered (port, role) pairs of one device model in one device role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortLayout {
    ports: Vec<(&'static str, InterfaceRole)>,
}

impl PortLayout {
    /// Layout of the data-plane ports. `None` when the role carries no
    /// data-plane interfaces or the model's port list does not line up
    /// with the role table.
    pub fn for_model(model: DeviceModel, device_role: DeviceRole) -> Option<Self> {
        let roles = match device_role {
            DeviceRole::Spine => SPINE_ROLES,
            DeviceRole::Leaf => LEAF_ROLES,
            _ => return None,
        };
        let ports = model.catalog().ports;
        if ports.len() != roles.len() {
            tracing::warn!(
                "{} has {} ports but the {} role table has {} entries",
                model.name(),
                ports.len(),
                device_role,
                roles.len()
            );
            return None;
        }
        Some(Self {
            ports: ports.iter().copied().zip(roles.iter().copied()).collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, InterfaceRole)> + '_ {
        self.ports.iter().copied()
    }

    /// Port names flagged with `role`, in port order
    pub fn ports_with_role(&self, role: InterfaceRole) -> Vec<String> {
        self.ports
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
