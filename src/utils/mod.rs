/// Redundant pair a 1-based index belongs to: 1,2 -> 1; 3,4 -> 2
pub fn pair_number(index: u32) -> u32 {
    (index + 1) / 2
}

/// Drop a leading `role:` tag from a description.
/// e.g. "uplink: ethernet10.leaf1" -> "ethernet10.leaf1"
pub fn remove_interface_prefixes(text: &str) -> String {
    match text.split_once(':') {
        Some((_, rest)) => rest.trim_start().to_string(),
        None => text.to_string(),
    }
}
