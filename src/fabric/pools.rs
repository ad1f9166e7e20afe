use anyhow::Result;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::models::{Prefix, PrefixRole};

/// A pool, port list or supernet ran out of room. Logged and reported,
/// never fatal to a whole generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityError {
    pub resource: String,
    pub message: String,
}

impl CapacityError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CapacityError {}

/// Slots already held by a topology. A slot held by the current owner
/// is free for it; slots of any other topology are skipped.
#[derive(Debug, Clone, Default)]
struct Reservations {
    held: HashMap<u32, Uuid>,
    owner: Option<Uuid>,
}

impl Reservations {
    fn is_free(&self, slot: u32) -> bool {
        self.held.get(&slot).map_or(true, |holder| Some(*holder) == self.owner)
    }

    fn take(&mut self, slot: u32) {
        if let Some(owner) = self.owner {
            self.held.insert(slot, owner);
        }
    }
}

/// Hands out the usable hosts of a network in order. Networks up to /30
/// skip the network and broadcast addresses; /31 and /32 use every address.
#[derive(Debug, Clone)]
pub struct HostAllocator {
    name: String,
    network: Ipv4Network,
    first: u64,
    next: u64,
    last: u64,
    reservations: Reservations,
}

impl HostAllocator {
    pub fn new(name: impl Into<String>, network: Ipv4Network) -> Self {
        let first = u32::from(network.network()) as u64;
        let last = u32::from(network.broadcast()) as u64;
        let (first, last) = if network.prefix() >= 31 {
            (first, last)
        } else {
            (first + 1, last - 1)
        };
        Self {
            name: name.into(),
            network,
            first,
            next: first,
            last,
            reservations: Reservations::default(),
        }
    }

    /// Mark `addr` as held by `topology`. Addresses outside the pool are ignored.
    pub fn reserve(&mut self, addr: Ipv4Addr, topology: Uuid) {
        if self.network.contains(addr) {
            self.reservations.held.insert(u32::from(addr), topology);
        }
    }

    /// Draw for `topology` from the start of the pool
    pub fn claim_for(&mut self, topology: Uuid) {
        self.reservations.owner = Some(topology);
        self.next = self.first;
    }

    pub fn next(&mut self) -> Result<Ipv4Addr, CapacityError> {
        while self.next <= self.last {
            let slot = self.next as u32;
            self.next += 1;
            if self.reservations.is_free(slot) {
                self.reservations.take(slot);
                return Ok(Ipv4Addr::from(slot));
            }
        }
        Err(CapacityError::new(
            &self.name,
            format!("Address pool {} ({}) is exhausted", self.name, self.network),
        ))
    }
}

/// Splits a network into consecutive subnets of one length
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    name: String,
    network: Ipv4Network,
    new_prefix: u8,
    index: u64,
    count: u64,
    reservations: Reservations,
}

impl SubnetAllocator {
    pub fn new(name: impl Into<String>, network: Ipv4Network, new_prefix: u8) -> Result<Self, CapacityError> {
        let name = name.into();
        if new_prefix > 32 || new_prefix < network.prefix() {
            return Err(CapacityError::new(
                &name,
                format!("{} cannot be split into /{} subnets", network, new_prefix),
            ));
        }
        Ok(Self {
            count: 1u64 << (new_prefix - network.prefix()),
            name,
            network,
            new_prefix,
            index: 0,
            reservations: Reservations::default(),
        })
    }

    /// Mark the subnet containing `addr` as held by `topology`
    pub fn reserve(&mut self, addr: Ipv4Addr, topology: Uuid) {
        if self.network.contains(addr) {
            let mask = u32::MAX.checked_shl(32 - self.new_prefix as u32).unwrap_or(0);
            self.reservations.held.insert(u32::from(addr) & mask, topology);
        }
    }

    /// Draw for `topology` from the first subnet
    pub fn claim_for(&mut self, topology: Uuid) {
        self.reservations.owner = Some(topology);
        self.index = 0;
    }

    pub fn next(&mut self) -> Result<Ipv4Network, CapacityError> {
        let step = 1u64 << (32 - self.new_prefix);
        let base = u32::from(self.network.network()) as u64;
        while self.index < self.count {
            let slot = (base + self.index * step) as u32;
            self.index += 1;
            if self.reservations.is_free(slot) {
                self.reservations.take(slot);
                return Ipv4Network::new(Ipv4Addr::from(slot), self.new_prefix)
                    .map_err(|e| CapacityError::new(&self.name, e.to_string()));
            }
        }
        Err(CapacityError::new(
            &self.name,
            format!("No /{} subnet left in {} ({})", self.new_prefix, self.name, self.network),
        ))
    }
}

/// Location prefix roles carved from a supernet, in carving order
pub const CARVED_ROLES: [PrefixRole; 4] = [
    PrefixRole::Management,
    PrefixRole::Technical,
    PrefixRole::Loopback,
    PrefixRole::LoopbackVtep,
];

fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Take the next four free /24s of a location supernet, in order, for
/// the management, technical, loopback and loopback-vtep roles.
pub fn carve_location_prefixes(
    shortname: &str,
    supernet: Ipv4Network,
    consumed: &[Ipv4Network],
) -> Result<Vec<(PrefixRole, Ipv4Network)>, CapacityError> {
    let resource = format!("{}-supernet", shortname.to_lowercase());
    let mut subnets = SubnetAllocator::new(&resource, supernet, 24)?;
    let mut carved = Vec::with_capacity(CARVED_ROLES.len());

    for role in CARVED_ROLES {
        loop {
            let candidate = subnets.next().map_err(|_| {
                CapacityError::new(
                    &resource,
                    format!("{} has fewer than {} free /24 prefixes", supernet, CARVED_ROLES.len()),
                )
            })?;
            if !consumed.iter().any(|c| overlaps(c, &candidate)) {
                carved.push((role, candidate));
                break;
            }
        }
    }
    Ok(carved)
}

/// A pool together with the prefix it draws from
#[derive(Debug, Clone)]
pub struct PrefixPool<A> {
    pub prefix: Prefix,
    pub allocator: A,
}

/// Address pools of one location, kept for the whole generation run.
/// Addresses already held by a topology in the store are reserved for
/// it, so topologies sharing a location never receive the same address.
#[derive(Debug, Clone)]
pub struct LocationPools {
    pub loopback: PrefixPool<HostAllocator>,
    pub vtep: PrefixPool<HostAllocator>,
    pub management: PrefixPool<HostAllocator>,
    pub technical: PrefixPool<SubnetAllocator>,
}

impl LocationPools {
    /// Build the pools from the location's prefixes. The widest prefix of
    /// each role wins; ties go to the first one stored.
    pub fn from_prefixes(shortname: &str, prefixes: &[Prefix]) -> Result<Self> {
        let pick = |role: PrefixRole| -> Result<Prefix> {
            prefixes
                .iter()
                .filter(|p| p.role == role)
                .min_by_key(|p| p.prefix.prefix())
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} doesn't have a {} prefix", shortname, role))
        };
        let loc = shortname.to_lowercase();

        let loopback = pick(PrefixRole::Loopback)?;
        let vtep = pick(PrefixRole::LoopbackVtep)?;
        let management = pick(PrefixRole::Management)?;
        let technical = pick(PrefixRole::Technical)?;
        let ico = SubnetAllocator::new(format!("{}-technical", loc), technical.prefix, 31)?;

        Ok(Self {
            loopback: PrefixPool {
                allocator: HostAllocator::new(format!("{}-loopback", loc), loopback.prefix),
                prefix: loopback,
            },
            vtep: PrefixPool {
                allocator: HostAllocator::new(format!("{}-loopback-vtep", loc), vtep.prefix),
                prefix: vtep,
            },
            management: PrefixPool {
                allocator: HostAllocator::new(format!("{}-management", loc), management.prefix),
                prefix: management,
            },
            technical: PrefixPool {
                allocator: ico,
                prefix: technical,
            },
        })
    }

    /// Hold `address` for `topology` in whichever pool contains it
    pub fn reserve(&mut self, address: Ipv4Network, topology: Uuid) {
        let ip = address.ip();
        self.loopback.allocator.reserve(ip, topology);
        self.vtep.allocator.reserve(ip, topology);
        self.management.allocator.reserve(ip, topology);
        self.technical.allocator.reserve(ip, topology);
    }

    /// Draw for `topology` from now on
    pub fn claim_for(&mut self, topology: Uuid) {
        self.loopback.allocator.claim_for(topology);
        self.vtep.allocator.claim_for(topology);
        self.management.allocator.claim_for(topology);
        self.technical.allocator.claim_for(topology);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrefixStatus;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    fn prefix(cidr: &str, role: PrefixRole) -> Prefix {
        Prefix {
            id: Uuid::new_v4(),
            prefix: net(cidr),
            description: String::new(),
            role,
            status: PrefixStatus::Active,
            namespace: "default".to_string(),
            location: None,
            vrf: None,
            organization: None,
        }
    }

    #[test]
    fn test_host_allocator_skips_network_and_broadcast() {
        let mut pool = HostAllocator::new("lo", net("10.0.2.0/30"));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 0, 2, 1));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 0, 2, 2));
        let err = pool.next().unwrap_err();
        assert_eq!(err.resource, "lo");
        assert!(pool.next().is_err());
    }

    #[test]
    fn test_host_allocator_point_to_point() {
        let mut pool = HostAllocator::new("p2p", net("10.0.1.4/31"));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 0, 1, 4));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 0, 1, 5));
        assert!(pool.next().is_err());
    }

    #[test]
    fn test_subnet_allocator_is_sequential() {
        let mut pool = SubnetAllocator::new("ico", net("10.0.1.0/24"), 31).unwrap();
        assert_eq!(pool.next().unwrap(), net("10.0.1.0/31"));
        assert_eq!(pool.next().unwrap(), net("10.0.1.2/31"));
        for _ in 0..126 {
            pool.next().unwrap();
        }
        assert!(pool.next().is_err());
        assert!(SubnetAllocator::new("bad", net("10.0.1.0/24"), 16).is_err());
    }

    #[test]
    fn test_carve_location_prefixes() {
        let carved = carve_location_prefixes("FRA05", net("10.1.0.0/16"), &[]).unwrap();
        assert_eq!(
            carved,
            vec![
                (PrefixRole::Management, net("10.1.0.0/24")),
                (PrefixRole::Technical, net("10.1.1.0/24")),
                (PrefixRole::Loopback, net("10.1.2.0/24")),
                (PrefixRole::LoopbackVtep, net("10.1.3.0/24")),
            ]
        );
    }

    #[test]
    fn test_carve_skips_consumed() {
        let consumed = vec![net("10.1.0.0/24"), net("10.1.2.128/25")];
        let carved = carve_location_prefixes("DE1", net("10.1.0.0/16"), &consumed).unwrap();
        let nets: Vec<Ipv4Network> = carved.iter().map(|(_, n)| *n).collect();
        assert_eq!(nets, vec![net("10.1.1.0/24"), net("10.1.3.0/24"), net("10.1.4.0/24"), net("10.1.5.0/24")]);
    }

    #[test]
    fn test_carve_needs_four_free_slots() {
        let err = carve_location_prefixes("DEN", net("10.9.0.0/23"), &[]).unwrap_err();
        assert_eq!(err.resource, "den-supernet");

        let consumed = vec![net("10.9.0.0/23")];
        assert!(carve_location_prefixes("DEN", net("10.9.0.0/22"), &consumed).is_err());
    }

    #[test]
    fn test_location_pools_pick_widest_prefix() {
        let prefixes = vec![
            prefix("10.1.0.0/24", PrefixRole::Management),
            prefix("10.1.1.0/31", PrefixRole::Technical),
            prefix("10.1.1.0/24", PrefixRole::Technical),
            prefix("10.1.2.0/24", PrefixRole::Loopback),
            prefix("10.1.3.0/24", PrefixRole::LoopbackVtep),
        ];
        let mut pools = LocationPools::from_prefixes("FRA05", &prefixes).unwrap();
        assert_eq!(pools.technical.prefix.prefix, net("10.1.1.0/24"));
        assert_eq!(pools.technical.allocator.next().unwrap(), net("10.1.1.0/31"));
        assert_eq!(pools.loopback.allocator.next().unwrap(), Ipv4Addr::new(10, 1, 2, 1));
    }

    #[test]
    fn test_location_pools_missing_role() {
        let prefixes = vec![prefix("10.1.0.0/24", PrefixRole::Management)];
        assert!(LocationPools::from_prefixes("FRA05", &prefixes).is_err());
    }

    #[test]
    fn test_host_allocator_skips_other_topologies() {
        let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
        let mut pool = HostAllocator::new("mgmt", net("10.1.0.0/24"));
        pool.reserve(Ipv4Addr::new(10, 1, 0, 1), theirs);
        pool.reserve(Ipv4Addr::new(10, 1, 0, 3), mine);
        pool.reserve(Ipv4Addr::new(10, 9, 0, 1), theirs);

        pool.claim_for(mine);
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 1, 0, 2));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 1, 0, 3));

        // A later topology restarts the scan but skips what was just drawn
        pool.claim_for(theirs);
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 1, 0, 1));
        assert_eq!(pool.next().unwrap(), Ipv4Addr::new(10, 1, 0, 4));
    }

    #[test]
    fn test_subnet_allocator_reserves_by_containing_subnet() {
        let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
        let mut pool = SubnetAllocator::new("ico", net("10.1.1.0/29"), 31).unwrap();
        pool.reserve(Ipv4Addr::new(10, 1, 1, 1), theirs);
        pool.reserve(Ipv4Addr::new(10, 1, 1, 4), theirs);

        pool.claim_for(mine);
        assert_eq!(pool.next().unwrap(), net("10.1.1.2/31"));
        assert_eq!(pool.next().unwrap(), net("10.1.1.6/31"));
        let err = pool.next().unwrap_err();
        assert_eq!(err.message, "No /31 subnet left in ico (10.1.1.0/29)");
    }

    #[test]
    fn test_reclaiming_returns_the_same_slots() {
        let topology = Uuid::new_v4();
        let mut pool = SubnetAllocator::new("ico", net("10.1.1.0/24"), 31).unwrap();
        pool.claim_for(topology);
        let first: Vec<Ipv4Network> = (0..3).map(|_| pool.next().unwrap()).collect();
        pool.claim_for(topology);
        let again: Vec<Ipv4Network> = (0..3).map(|_| pool.next().unwrap()).collect();
        assert_eq!(first, again);
    }
}
