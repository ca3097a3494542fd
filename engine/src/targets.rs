//! Target resolution

use std::collections::HashSet;

use crate::models::device::{Device, TargetSpec};

/// Resolve a target spec against a fleet snapshot
///
/// Returns the matching devices deduplicated by id, fleet order preserved.
/// Unknown aliases are dropped silently so stale selections stay usable.
/// No side effects.
pub fn resolve(spec: &TargetSpec, fleet: &[Device]) -> Vec<Device> {
    let matched = fleet.iter().filter(|device| match spec {
        TargetSpec::All => true,
        TargetSpec::Filter { online_only } => !online_only || device.online,
        TargetSpec::Aliases { aliases } => aliases.iter().any(|a| a == &device.alias),
    });

    let mut seen: HashSet<&str> = HashSet::new();
    let mut targets = Vec::new();
    for device in matched {
        if seen.insert(device.id.as_str()) {
            targets.push(device.clone());
        }
    }
    targets
}
