use std::collections::{BTreeMap, VecDeque};

use hashbrown::{HashMap, HashSet};
use itemrando_game::{ItemId, LocationId};
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{FillError, FillResult};

/// Final item assignment. Shops hold an ordered list; everything else holds one item.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Placements {
    #[serde(serialize_with = "serialize_sorted")]
    pub ordinary: HashMap<LocationId, ItemId>,
    #[serde(serialize_with = "serialize_sorted")]
    pub shops: HashMap<LocationId, Vec<ItemId>>,
}

/// Writes a map in key order, so output for a given seed is stable across runs.
pub fn serialize_sorted<S, K, V>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    K: Serialize + Ord,
    V: Serialize,
{
    let sorted: BTreeMap<&K, &V> = map.iter().collect();
    sorted.serialize(serializer)
}

impl Placements {
    pub fn is_placed(&self, location: LocationId) -> bool {
        self.ordinary.contains_key(&location) || self.shops.contains_key(&location)
    }

    pub fn contains_item(&self, item: ItemId) -> bool {
        self.ordinary.values().any(|&i| i == item)
            || self.shops.values().any(|items| items.contains(&item))
    }

    pub fn item_count(&self) -> usize {
        self.ordinary.len() + self.shops.values().map(|v| v.len()).sum::<usize>()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocationPool {
    Unplaced,
    Standby,
    Placed,
    HeldAside,
}

fn remove_first<T: PartialEq>(list: &mut Vec<T>, x: T) -> bool {
    match list.iter().position(|y| *y == x) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

fn random_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        rng.gen_range(0..len)
    }
}

/// Partition of the randomized items and locations.
///
/// Items live in exactly one of unplaced junk, unplaced progression, the two
/// standby lists, or the placement record. Locations live in exactly one of
/// unplaced, standby, placed, or (for shops skipped on the first pass) held
/// aside. Order stamps are handed out the first time a location leaves the
/// unplaced pool and are never changed afterwards.
#[derive(Clone, Debug, Default)]
pub struct ItemPools {
    unplaced_locations: Vec<LocationId>,
    unplaced_items: Vec<ItemId>,
    unplaced_progression: Vec<ItemId>,
    standby_locations: Vec<LocationId>,
    standby_items: Vec<ItemId>,
    standby_progression: Vec<ItemId>,
    held_shops: Vec<LocationId>,
    progression_flag: VecDeque<bool>,
    location_order: HashMap<LocationId, usize>,
    placements: Placements,
    shops: HashSet<LocationId>,
}

impl ItemPools {
    pub fn new(locations: Vec<LocationId>, shops: HashSet<LocationId>) -> Self {
        ItemPools {
            unplaced_locations: locations,
            shops,
            ..ItemPools::default()
        }
    }

    /// Draws an item into the unplaced pools, recording whether it was
    /// progression in the routing queue.
    pub fn push_item(&mut self, item: ItemId, progression: bool) {
        if progression {
            self.unplaced_progression.push(item);
        } else {
            self.unplaced_items.push(item);
        }
        self.progression_flag.push_back(progression);
    }

    /// Drops an item from the unplaced pools without placing it (starting items).
    pub fn remove_unplaced_item(&mut self, item: ItemId) -> bool {
        remove_first(&mut self.unplaced_items, item)
            || remove_first(&mut self.unplaced_progression, item)
    }

    pub fn hold_aside_shops(&mut self) {
        let shops = &self.shops;
        let (held, kept): (Vec<LocationId>, Vec<LocationId>) = self
            .unplaced_locations
            .iter()
            .partition(|loc| shops.contains(*loc));
        self.held_shops.extend(held);
        self.unplaced_locations = kept;
    }

    pub fn is_shop(&self, location: LocationId) -> bool {
        self.shops.contains(&location)
    }

    pub fn shops(&self) -> Vec<LocationId> {
        let mut shops: Vec<LocationId> = self.shops.iter().copied().collect();
        shops.sort();
        shops
    }

    /// Picks the next item. With `check_flag`, the routing queue decides
    /// between the progression and junk heads; otherwise junk comes first.
    /// The item stays in its pool until one of the `place_*` calls.
    pub fn next_item(&mut self, check_flag: bool) -> FillResult<ItemId> {
        if check_flag {
            if let Some(true) = self.progression_flag.pop_front() {
                if let Some(&item) = self.unplaced_progression.first() {
                    return Ok(item);
                }
            }
        }
        if let Some(&item) = self.unplaced_items.first() {
            Ok(item)
        } else if let Some(&item) = self.unplaced_progression.first() {
            Ok(item)
        } else if let Some(&item) = self.standby_items.first() {
            Ok(item)
        } else if let Some(&item) = self.standby_progression.first() {
            Ok(item)
        } else {
            Err(FillError::PoolExhausted { pool: "items" })
        }
    }

    fn update_order(&mut self, location: LocationId) {
        if !self.location_order.contains_key(&location) {
            let order = self.location_order.len() + 1;
            self.location_order.insert(location, order);
        }
    }

    fn record(&mut self, item: ItemId, location: LocationId) -> FillResult<()> {
        if self.shops.contains(&location) {
            self.placements.shops.entry(location).or_default().push(item);
        } else {
            if self.placements.ordinary.contains_key(&location) {
                return Err(FillError::PoolExhausted {
                    pool: "locations",
                });
            }
            self.placements.ordinary.insert(location, item);
        }
        Ok(())
    }

    /// First-pass placement: takes the item from the unplaced pools.
    pub fn place_item(&mut self, item: ItemId, location: LocationId) -> FillResult<()> {
        if !remove_first(&mut self.unplaced_items, item)
            && !remove_first(&mut self.unplaced_progression, item)
        {
            return Err(FillError::PoolExhausted { pool: "unplaced items" });
        }
        self.record(item, location)?;
        self.update_order(location);
        remove_first(&mut self.unplaced_locations, location);
        Ok(())
    }

    /// Second-pass placement: the item may come from any pool, and shops may
    /// receive more than one item.
    pub fn place_item_from_standby(&mut self, item: ItemId, location: LocationId) -> FillResult<()> {
        if !remove_first(&mut self.unplaced_items, item)
            && !remove_first(&mut self.unplaced_progression, item)
            && !remove_first(&mut self.standby_items, item)
            && !remove_first(&mut self.standby_progression, item)
        {
            return Err(FillError::PoolExhausted { pool: "standby items" });
        }
        self.record(item, location)?;
        self.update_order(location);
        remove_first(&mut self.unplaced_locations, location);
        remove_first(&mut self.standby_locations, location);
        Ok(())
    }

    pub fn place_progression_to_standby(&mut self, item: ItemId) -> FillResult<()> {
        if !remove_first(&mut self.unplaced_progression, item) {
            return Err(FillError::PoolExhausted {
                pool: "unplaced progression",
            });
        }
        self.standby_progression.push(item);
        Ok(())
    }

    pub fn place_junk_item_to_standby(&mut self, item: ItemId, location: LocationId) -> FillResult<()> {
        if !remove_first(&mut self.unplaced_items, item) {
            return Err(FillError::PoolExhausted { pool: "unplaced items" });
        }
        if !remove_first(&mut self.unplaced_locations, location) {
            return Err(FillError::PoolExhausted {
                pool: "unplaced locations",
            });
        }
        self.standby_items.push(item);
        self.standby_locations.push(location);
        self.update_order(location);
        Ok(())
    }

    /// Merges standby back into the unplaced pools for the second pass.
    /// Deferred progression goes first, then anything left unplaced, then junk.
    pub fn transfer_standby(&mut self) {
        let mut items = std::mem::take(&mut self.standby_progression);
        items.append(&mut self.unplaced_progression);
        items.append(&mut self.standby_items);
        items.append(&mut self.unplaced_items);
        self.unplaced_items = items;

        let mut locations = std::mem::take(&mut self.standby_locations);
        locations.append(&mut self.unplaced_locations);
        locations.append(&mut self.held_shops);
        self.unplaced_locations = locations;

        self.progression_flag.clear();
    }

    /// Puts a shop back among the unplaced locations at a random position.
    /// Returns false if the shop is already waiting in a pool.
    pub fn reinsert_location<R: Rng + ?Sized>(&mut self, location: LocationId, rng: &mut R) -> bool {
        if self.unplaced_locations.contains(&location)
            || self.standby_locations.contains(&location)
            || self.held_shops.contains(&location)
        {
            return false;
        }
        let idx = random_index(rng, self.unplaced_locations.len());
        self.unplaced_locations.insert(idx, location);
        true
    }

    /// Moves one random standby location and the oldest standby junk item
    /// back into the unplaced pools. Order stamps are kept.
    pub fn release_standby<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(LocationId, ItemId)> {
        if self.standby_locations.is_empty() || self.standby_items.is_empty() {
            return None;
        }
        let location = self
            .standby_locations
            .remove(random_index(rng, self.standby_locations.len()));
        let idx = random_index(rng, self.unplaced_locations.len());
        self.unplaced_locations.insert(idx, location);
        let item = self.standby_items.remove(0);
        self.unplaced_items.push(item);
        Some((location, item))
    }

    /// Places whatever shops are still waiting with no further items, so that
    /// every location ends up in the placement record.
    pub fn close_shops(&mut self) {
        let shops = &self.shops;
        let (remaining, kept): (Vec<LocationId>, Vec<LocationId>) = self
            .unplaced_locations
            .iter()
            .partition(|loc| shops.contains(*loc));
        self.unplaced_locations = kept;
        for location in remaining {
            self.placements.shops.entry(location).or_default();
            self.update_order(location);
        }
    }

    pub fn location_pool(&self, location: LocationId) -> Option<LocationPool> {
        if self.unplaced_locations.contains(&location) {
            Some(LocationPool::Unplaced)
        } else if self.standby_locations.contains(&location) {
            Some(LocationPool::Standby)
        } else if self.held_shops.contains(&location) {
            Some(LocationPool::HeldAside)
        } else if self.placements.is_placed(location) {
            Some(LocationPool::Placed)
        } else {
            None
        }
    }

    pub fn any_locations(&self) -> bool {
        !self.unplaced_locations.is_empty()
    }

    pub fn any_items(&self) -> bool {
        !self.unplaced_items.is_empty()
            || !self.unplaced_progression.is_empty()
            || !self.standby_items.is_empty()
            || !self.standby_progression.is_empty()
    }

    pub fn any_ordinary_locations(&self) -> bool {
        self.unplaced_locations
            .iter()
            .chain(self.standby_locations.iter())
            .any(|loc| !self.shops.contains(loc))
    }

    pub fn unplaced_locations(&self) -> &[LocationId] {
        &self.unplaced_locations
    }

    pub fn unplaced_items(&self) -> &[ItemId] {
        &self.unplaced_items
    }

    pub fn unplaced_progression(&self) -> &[ItemId] {
        &self.unplaced_progression
    }

    pub fn standby_locations(&self) -> &[LocationId] {
        &self.standby_locations
    }

    pub fn standby_items(&self) -> &[ItemId] {
        &self.standby_items
    }

    pub fn standby_progression(&self) -> &[ItemId] {
        &self.standby_progression
    }

    pub fn held_shops(&self) -> &[LocationId] {
        &self.held_shops
    }

    pub fn location_order(&self) -> &HashMap<LocationId, usize> {
        &self.location_order
    }

    pub fn placements(&self) -> &Placements {
        &self.placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pools_with(locations: Vec<LocationId>, items: &[(ItemId, bool)]) -> ItemPools {
        let mut pools = ItemPools::new(locations, HashSet::new());
        for &(item, progression) in items {
            pools.push_item(item, progression);
        }
        pools
    }

    #[test]
    fn test_next_item_follows_flag_queue() {
        let mut pools = pools_with(vec![0, 1, 2], &[(10, false), (11, true), (12, false)]);
        // Flag for the first draw was junk, so the junk head comes out:
        assert_eq!(pools.next_item(true).unwrap(), 10);
        assert_eq!(pools.next_item(true).unwrap(), 11);
        assert_eq!(pools.next_item(false).unwrap(), 10);
    }

    #[test]
    fn test_next_item_falls_through_to_standby() {
        let mut pools = pools_with(vec![0, 1], &[(10, false), (11, true)]);
        pools.place_junk_item_to_standby(10, 0).unwrap();
        pools.place_progression_to_standby(11).unwrap();
        assert_eq!(pools.next_item(true).unwrap(), 10);
        pools.standby_items.clear();
        assert_eq!(pools.next_item(false).unwrap(), 11);
        pools.standby_progression.clear();
        assert_eq!(
            pools.next_item(false),
            Err(FillError::PoolExhausted { pool: "items" })
        );
    }

    #[test]
    fn test_order_stamps_assigned_once() {
        let mut pools = pools_with(vec![5, 6, 7], &[(0, false), (1, true), (2, false)]);
        pools.place_junk_item_to_standby(0, 6).unwrap();
        pools.place_item(1, 5).unwrap();
        pools.transfer_standby();
        assert_eq!(pools.unplaced_locations(), &[6, 7]);
        pools.place_item_from_standby(0, 6).unwrap();
        pools.place_item_from_standby(2, 7).unwrap();
        assert_eq!(pools.location_order()[&6], 1);
        assert_eq!(pools.location_order()[&5], 2);
        assert_eq!(pools.location_order()[&7], 3);
        assert!(!pools.any_items());
        assert!(!pools.any_locations());
        assert_eq!(pools.placements().item_count(), 3);
    }

    #[test]
    fn test_transfer_standby_order() {
        let mut pools = pools_with(
            vec![0, 1, 2, 3],
            &[(10, false), (11, true), (12, false), (13, true)],
        );
        pools.place_junk_item_to_standby(10, 1).unwrap();
        pools.place_progression_to_standby(13).unwrap();
        pools.transfer_standby();
        assert_eq!(pools.unplaced_items(), &[13, 11, 10, 12]);
        assert_eq!(pools.unplaced_locations(), &[1, 0, 2, 3]);
        assert!(pools.standby_items().is_empty());
        assert!(pools.standby_locations().is_empty());
        assert!(pools.unplaced_progression().is_empty());
    }

    #[test]
    fn test_release_keeps_pools_disjoint() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut pools = pools_with(vec![0, 1, 2], &[(10, false), (11, false), (12, true)]);
        pools.place_junk_item_to_standby(10, 0).unwrap();
        let (location, item) = pools.release_standby(&mut rng).unwrap();
        assert_eq!((location, item), (0, 10));
        assert_eq!(pools.location_pool(0), Some(LocationPool::Unplaced));
        assert!(pools.standby_locations().is_empty());
        assert!(pools.release_standby(&mut rng).is_none());
        // The stamp from the first departure survives:
        assert_eq!(pools.location_order()[&0], 1);
    }

    #[test]
    fn test_shops_accept_lists_and_reinsert() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let shops: HashSet<LocationId> = [9].into_iter().collect();
        let mut pools = ItemPools::new(vec![0, 9], shops);
        pools.push_item(1, true);
        pools.push_item(2, false);
        pools.push_item(3, false);
        pools.place_item(1, 9).unwrap();
        assert_eq!(pools.location_pool(9), Some(LocationPool::Placed));
        assert!(pools.reinsert_location(9, &mut rng));
        assert!(!pools.reinsert_location(9, &mut rng));
        pools.place_item(2, 9).unwrap();
        assert_eq!(pools.placements().shops[&9], vec![1, 2]);
        assert!(pools.any_ordinary_locations());
    }

    #[test]
    fn test_placements_serialize_in_location_order() {
        let mut placements = Placements::default();
        for (location, item) in [(7, 0), (2, 4), (11, 3), (5, 1)] {
            placements.ordinary.insert(location, item);
        }
        placements.shops.insert(9, vec![6, 2]);
        placements.shops.insert(3, vec![]);
        let json = serde_json::to_string(&placements).unwrap();
        assert_eq!(
            json,
            r#"{"ordinary":{"2":4,"5":1,"7":0,"11":3},"shops":{"3":[],"9":[6,2]}}"#
        );
        let parsed: Placements = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, placements);
    }

    #[test]
    fn test_held_aside_shops_return_on_transfer() {
        let shops: HashSet<LocationId> = [1].into_iter().collect();
        let mut pools = ItemPools::new(vec![0, 1, 2], shops);
        pools.hold_aside_shops();
        assert_eq!(pools.unplaced_locations(), &[0, 2]);
        assert_eq!(pools.location_pool(1), Some(LocationPool::HeldAside));
        pools.transfer_standby();
        assert_eq!(pools.unplaced_locations(), &[0, 2, 1]);
        pools.close_shops();
        assert_eq!(pools.location_pool(1), Some(LocationPool::Placed));
        assert_eq!(pools.placements().shops[&1], Vec::<ItemId>::new());
    }
}
