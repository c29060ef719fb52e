use common::domain::VehiclePosition;
use std::collections::BTreeMap;

/// Collapse one cycle's positions to a single record per vehicle key.
///
/// Input order is provider response order and a later row replaces an earlier
/// one for the same key. The map iterates keys in sorted order.
pub fn deduplicate<I>(positions: I) -> BTreeMap<String, VehiclePosition>
where
    I: IntoIterator<Item = VehiclePosition>,
{
    let mut latest = BTreeMap::new();
    for position in positions {
        latest.insert(position.vehicle_key.clone(), position);
    }
    latest
}
