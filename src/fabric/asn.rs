use crate::models::DeviceRole;
use crate::utils::pair_number;

const PRIVATE_ASN_BASE: u32 = 65000;

/// Private ASN for a device.
///
/// `element_index` is 0 for spines, so all spines of an element share
/// one ASN; leaves use their 1-based index, so each redundant pair
/// shares one.
pub fn generate_asn(location_index: u32, element_type_index: u32, element_index: u32) -> u32 {
    PRIVATE_ASN_BASE + (location_index + 1) * 100 + element_type_index * 10 + pair_number(element_index)
}

/// Index fed to [`generate_asn`] for the `device_index`-th device of a role
pub fn element_index(role: DeviceRole, device_index: u32) -> u32 {
    if role == DeviceRole::Spine {
        0
    } else {
        device_index
    }
}
