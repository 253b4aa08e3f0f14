use hashbrown::HashSet;
use itemrando_game::{GameData, ItemId, LocationId, LocationKind};
use log::info;
use rand::Rng;

use crate::settings::{FillSettings, SplitPoolSetting};

fn active_splits<'s>(settings: &'s FillSettings) -> Vec<&'s SplitPoolSetting> {
    settings
        .split_pools
        .iter()
        .filter(|s| settings.is_pool_randomized(&s.pool) && settings.is_pool_randomized(&s.parent_pool))
        .collect()
}

fn is_split_pool(settings: &FillSettings, pool: &str) -> bool {
    settings.split_pools.iter().any(|s| s.pool == pool)
}

fn in_enabled_pool(settings: &FillSettings, splits: &[&SplitPoolSetting], pool: &str) -> bool {
    if !settings.is_pool_randomized(pool) {
        return false;
    }
    // A split pool with its parent disabled contributes nothing.
    !is_split_pool(settings, pool) || splits.iter().any(|s| s.pool == pool)
}

/// Items drawn into the fill, before the augment hook and duplicates. Sorted by id.
pub fn randomized_items<R: Rng + ?Sized>(
    game_data: &GameData,
    settings: &FillSettings,
    rng: &mut R,
) -> Vec<ItemId> {
    let splits = active_splits(settings);
    let mut removed: HashSet<&str> = HashSet::new();
    for split in &splits {
        removed.extend(split.replaces.iter().map(|s| s.as_str()));
        if !split.omit_one_of.is_empty() {
            let idx = rng.gen_range(0..split.omit_one_of.len());
            let omitted = &split.omit_one_of[idx];
            info!("Split pool {}: omitting {}", split.pool, omitted);
            removed.insert(omitted.as_str());
        }
    }
    let mut items: Vec<ItemId> = vec![];
    for (item_id, item) in game_data.items.iter().enumerate() {
        if in_enabled_pool(settings, &splits, &item.pool) && !removed.contains(item.name.as_str()) {
            items.push(item_id);
        }
    }
    items
}

/// Locations taking part in the fill. Every shop takes part regardless of its
/// pool; this doesn't touch the random source, so callers can compute it ahead
/// of the engine (e.g. to set up vanilla placements).
pub fn randomized_locations(game_data: &GameData, settings: &FillSettings) -> Vec<LocationId> {
    let splits = active_splits(settings);
    let removed: HashSet<&str> = splits
        .iter()
        .flat_map(|s| s.replaces.iter().map(|r| r.as_str()))
        .collect();
    let mut locations: Vec<LocationId> = vec![];
    for (location_id, location) in game_data.locations.iter().enumerate() {
        if location.kind == LocationKind::Shop {
            locations.push(location_id);
        } else if in_enabled_pool(settings, &splits, &location.pool)
            && !removed.contains(location.name.as_str())
        {
            locations.push(location_id);
        }
    }
    locations
}
