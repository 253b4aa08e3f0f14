use std::collections::VecDeque;

use hashbrown::HashSet;
use itemrando_game::{GameData, ItemDef, ItemId, LocationId, Token};
use itemrando_logic::{CapabilityState, ReachabilityOracle, Target, VanillaLocationManager};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FillError, FillResult};
use crate::pool::{ItemPools, LocationPool, Placements};
use crate::selection::{randomized_items, randomized_locations};
use crate::settings::{FillSettings, StartingCapabilities};

/// Shops take part in the first pass only if the surplus of items over
/// locations, plus this constant, reaches it.
pub const NORMAL_FILL_SHOPS_THRESHOLD: isize = 5;
/// Above this surplus, shops may be put back into the unplaced pool during delinearization.
pub const DELINEARIZE_SHOPS_THRESHOLD: isize = 12;
pub const SHOP_DELINEARIZE_ODDS: u32 = 8;
pub const STANDBY_RELEASE_ODDS: u32 = 2;

pub type AugmentFn<'a> = dyn Fn(HashSet<ItemId>) -> HashSet<ItemId> + 'a;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPhase {
    Filling,
    Stalled,
    StandbyReleased,
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementKind {
    /// Placed for good during the first pass.
    Placed,
    /// Junk and its location both moved to standby.
    Deferred,
    /// Placed during the second pass.
    FromStandby,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementEvent {
    pub item: ItemId,
    pub location: LocationId,
    pub kind: PlacementKind,
    pub order: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepResult {
    Placed(PlacementEvent),
    Stalled,
    Done,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStats {
    pub steps: usize,
    pub placed: usize,
    pub deferred: usize,
    pub forced: usize,
    pub guessed: usize,
    pub stalls: usize,
    pub released: usize,
    pub shops_reinserted: usize,
    pub transfers: usize,
}

pub struct FillEngine<'a, R: Rng, O: ReachabilityOracle, V: VanillaLocationManager> {
    rng: R,
    game_data: &'a GameData,
    oracle: &'a O,
    vanilla: V,
    items: Vec<ItemDef>, // Catalog items, followed by duplicates
    duplicated_items: Vec<ItemId>,
    pools: ItemPools,
    state: CapabilityState,
    update_queue: VecDeque<Token>,
    reachable: HashSet<LocationId>,
    randomized: HashSet<LocationId>,
    vanilla_progression: HashSet<LocationId>,
    vanilla_granted: HashSet<ItemId>,
    deferred_progression: HashSet<ItemId>,
    starting_items: HashSet<ItemId>,
    randomize_transitions: bool,
    cursed: bool,
    normal_fill_shops: bool,
    delinearize_shops: bool,
    phase: FillPhase,
    transferred: bool,
    stats: FillStats,
}

impl<'a, R: Rng, O: ReachabilityOracle, V: VanillaLocationManager> FillEngine<'a, R, O, V> {
    pub fn new(
        mut rng: R,
        game_data: &'a GameData,
        oracle: &'a O,
        vanilla: V,
        settings: &FillSettings,
        starting: &StartingCapabilities,
        augment: Option<&AugmentFn<'_>>,
    ) -> FillResult<Self> {
        let mut item_set: HashSet<ItemId> = randomized_items(game_data, settings, &mut rng)
            .into_iter()
            .collect();
        // Duplicates come from the pool selection alone; augmented items get none.
        let mut duplicate_sources: Vec<ItemId> = item_set.iter().copied().collect();
        duplicate_sources.sort();
        if let Some(augment) = augment {
            item_set = augment(item_set);
        }
        let mut base_items: Vec<ItemId> = item_set.into_iter().collect();
        base_items.sort();
        if base_items.iter().any(|&i| i >= game_data.items.len()) {
            return Err(FillError::InvalidSettingsCombination(
                "augmented item set refers to unknown items".to_string(),
            ));
        }

        let mut locations = randomized_locations(game_data, settings);
        if base_items.is_empty() || locations.is_empty() {
            return Err(FillError::InvalidSettingsCombination(format!(
                "selected pools give {} items and {} locations",
                base_items.len(),
                locations.len()
            )));
        }
        let randomized: HashSet<LocationId> = locations.iter().copied().collect();
        let shops: HashSet<LocationId> = locations
            .iter()
            .copied()
            .filter(|&loc| game_data.is_shop(loc))
            .collect();

        let mut items = game_data.items.clone();
        let mut duplicated_items = vec![];
        let starting_items: HashSet<ItemId> = starting.items.iter().copied().collect();
        if settings.duplicate_major_items {
            for &item_id in &duplicate_sources {
                let item = &game_data.items[item_id];
                if item.major_item && !starting_items.contains(&item_id) {
                    duplicated_items.push(items.len());
                    items.push(ItemDef {
                        name: format!("{}_(Dup)", item.name),
                        pool: item.pool.clone(),
                        progression: false,
                        major_item: false,
                        item_candidate: false,
                    });
                }
            }
        }
        let mut draw: Vec<ItemId> = base_items;
        draw.extend(&duplicated_items);

        locations.shuffle(&mut rng);
        let mut pools = ItemPools::new(locations, shops);
        while !draw.is_empty() {
            let mut idx = rng.gen_range(0..draw.len());
            if settings.cursed && items[draw[idx]].major_item {
                idx = rng.gen_range(0..draw.len());
            }
            let item_id = draw.remove(idx);
            pools.push_item(item_id, items[item_id].progression);
        }

        let vanilla_progression: HashSet<LocationId> =
            vanilla.progression_locations().into_iter().collect();
        let mut engine = FillEngine {
            rng,
            game_data,
            oracle,
            vanilla,
            items,
            duplicated_items,
            pools,
            state: CapabilityState::new(),
            update_queue: VecDeque::new(),
            reachable: HashSet::new(),
            randomized,
            vanilla_progression,
            vanilla_granted: HashSet::new(),
            deferred_progression: HashSet::new(),
            starting_items,
            randomize_transitions: settings.randomize_transitions,
            cursed: settings.cursed,
            normal_fill_shops: true,
            delinearize_shops: false,
            phase: FillPhase::Filling,
            transferred: false,
            stats: FillStats::default(),
        };

        for &flag in &starting.flags {
            engine.grant(Token::Setting(flag));
        }
        if !engine.randomize_transitions {
            // Without transition randomization every connection is in its vanilla state.
            for transition_id in 0..game_data.transitions.len() {
                engine.grant(Token::Transition(transition_id));
            }
        }
        for &item_id in &starting.items {
            engine.pools.remove_unplaced_item(item_id);
            if engine.items[item_id].progression {
                engine.grant(Token::Item(item_id));
            }
        }
        engine.reset_reachable_locations();

        let num_items =
            (engine.pools.unplaced_items().len() + engine.pools.unplaced_progression().len()) as isize;
        let num_locations = engine.pools.unplaced_locations().len() as isize;
        let num_shops = engine.pools.shops().len();
        let num_ordinary = num_locations as usize - num_shops;
        if (num_items as usize) < num_ordinary {
            return Err(FillError::InvalidSettingsCombination(format!(
                "{num_items} items cannot fill {num_ordinary} locations"
            )));
        }
        if num_shops == 0 && num_items as usize > num_ordinary {
            return Err(FillError::InvalidSettingsCombination(format!(
                "{} surplus items but no shops",
                num_items as usize - num_ordinary
            )));
        }
        let shop_item_count = num_items - num_locations + NORMAL_FILL_SHOPS_THRESHOLD;
        engine.normal_fill_shops = shop_item_count >= NORMAL_FILL_SHOPS_THRESHOLD;
        engine.delinearize_shops = shop_item_count > DELINEARIZE_SHOPS_THRESHOLD;
        if !engine.normal_fill_shops {
            warn!("Too few items to fill shops on the first pass ({shop_item_count}); shops are held aside");
            engine.pools.hold_aside_shops();
        }
        Ok(engine)
    }

    fn grant(&mut self, token: Token) {
        if self.state.add(token) {
            self.update_queue.push_back(token);
        }
    }

    fn is_candidate(&self, location: LocationId) -> bool {
        self.randomized.contains(&location) || self.vanilla_progression.contains(&location)
    }

    fn mark_reachable(&mut self, location: LocationId) {
        if !self.reachable.insert(location) {
            return;
        }
        if self.vanilla_progression.contains(&location) {
            for token in self.vanilla.update_vanilla_location(location) {
                if let Token::Item(item_id) = token {
                    self.vanilla_granted.insert(item_id);
                }
                self.grant(token);
            }
        }
    }

    fn grant_transition(&mut self, transition_id: usize) {
        self.grant(Token::Transition(transition_id));
        if let Some(&pair) = self.game_data.transition_pairs.get(&transition_id) {
            self.grant(Token::Transition(pair));
        }
    }

    /// Recomputes the reachable set from scratch.
    pub fn reset_reachable_locations(&mut self) {
        self.reachable.clear();
        let mut candidates: Vec<LocationId> = self
            .randomized
            .iter()
            .chain(self.vanilla_progression.iter())
            .copied()
            .collect();
        candidates.sort();
        candidates.dedup();
        for location in candidates {
            if self
                .oracle
                .can_reach(&self.state, Target::Location(location))
            {
                self.mark_reachable(location);
            }
        }
        if self.randomize_transitions {
            for transition_id in 0..self.game_data.transitions.len() {
                if !self.state.has(Token::Transition(transition_id))
                    && self
                        .oracle
                        .can_reach(&self.state, Target::Transition(transition_id))
                {
                    self.grant_transition(transition_id);
                }
            }
        }
        self.update_reachable_locations(None);
    }

    /// Adds `new_token` (if any) and propagates until nothing else opens up.
    pub fn update_reachable_locations(&mut self, new_token: Option<Token>) {
        if let Some(token) = new_token {
            self.grant(token);
        }
        while self.update_queue.pop_front().is_some() {
            let recent = self.state.take_recent();
            if recent.is_empty() {
                continue;
            }
            for location in self.oracle.locations_unlocked_by(&recent) {
                if self.is_candidate(location)
                    && !self.reachable.contains(&location)
                    && self
                        .oracle
                        .can_reach(&self.state, Target::Location(location))
                {
                    self.mark_reachable(location);
                }
            }
            if self.randomize_transitions {
                for transition_id in self.oracle.transitions_unlocked_by(&recent) {
                    if !self.state.has(Token::Transition(transition_id))
                        && self
                            .oracle
                            .can_reach(&self.state, Target::Transition(transition_id))
                    {
                        self.grant_transition(transition_id);
                    }
                }
            }
        }
    }

    pub fn available_count(&self) -> usize {
        self.pools
            .unplaced_locations()
            .iter()
            .filter(|loc| self.reachable.contains(*loc))
            .count()
    }

    pub fn any_locations(&self) -> bool {
        self.pools.any_locations()
    }

    pub fn any_items(&self) -> bool {
        self.pools.any_items()
    }

    pub fn can_guess(&self) -> bool {
        self.pools
            .unplaced_progression()
            .iter()
            .any(|&i| self.items[i].item_candidate)
    }

    /// First unplaced location in the reachable set.
    pub fn next_location(&self) -> Option<LocationId> {
        self.pools
            .unplaced_locations()
            .iter()
            .copied()
            .find(|loc| self.reachable.contains(loc))
    }

    /// First unplaced location reachable by a fresh oracle check.
    pub fn find_next_location(&self) -> Option<LocationId> {
        self.pools
            .unplaced_locations()
            .iter()
            .copied()
            .find(|&loc| self.oracle.can_reach(&self.state, Target::Location(loc)))
    }

    fn check_for_new_locations(&self, temp_tokens: &[Token]) -> bool {
        self.oracle
            .locations_unlocked_by(temp_tokens)
            .into_iter()
            .any(|loc| {
                self.randomized.contains(&loc)
                    && !self.reachable.contains(&loc)
                    && self.oracle.can_reach(&self.state, Target::Location(loc))
            })
    }

    fn add_temp_transitions(&mut self, queue: &mut VecDeque<Token>, temp_tokens: &mut Vec<Token>) {
        for transition_id in self.oracle.transitions_unlocked_by(&temp_tokens[..]) {
            let token = Token::Transition(transition_id);
            if self.state.has(token) || !self.oracle.can_reach(&self.state, Target::Transition(transition_id)) {
                continue;
            }
            self.state.add_temp(token);
            queue.push_back(token);
            temp_tokens.push(token);
            if let Some(&pair) = self.game_data.transition_pairs.get(&transition_id) {
                let pair_token = Token::Transition(pair);
                if self.state.add_temp(pair_token) {
                    queue.push_back(pair_token);
                    temp_tokens.push(pair_token);
                }
            }
        }
    }

    /// Returns the first unplaced progression item which, on its own, makes
    /// some unreachable randomized location reachable.
    pub fn force_item(&mut self) -> Option<ItemId> {
        let candidates: Vec<ItemId> = self.pools.unplaced_progression().to_vec();
        for item_id in candidates {
            let mut found = false;
            let mut queue: VecDeque<Token> = VecDeque::new();
            let mut temp_tokens: Vec<Token> = vec![];
            let token = Token::Item(item_id);
            if self.state.add_temp(token) {
                queue.push_back(token);
                temp_tokens.push(token);
            }
            while queue.pop_front().is_some() {
                if self.randomize_transitions {
                    self.add_temp_transitions(&mut queue, &mut temp_tokens);
                }
                found = found || self.check_for_new_locations(&temp_tokens);
            }
            self.state.remove_temp();
            if found {
                debug!("Forced item {}", self.items[item_id].name);
                return Some(item_id);
            }
        }
        None
    }

    pub fn guess_item(&self) -> Option<ItemId> {
        self.pools
            .unplaced_progression()
            .iter()
            .copied()
            .find(|&i| self.items[i].item_candidate)
    }

    fn delinearize(&mut self) {
        if self.cursed {
            return;
        }
        if self.delinearize_shops
            && !self.pools.unplaced_progression().is_empty()
            && self.rng.gen_range(0..SHOP_DELINEARIZE_ODDS) == 0
        {
            let shops = self.pools.shops();
            if !shops.is_empty() {
                let shop = shops[self.rng.gen_range(0..shops.len())];
                if self.pools.reinsert_location(shop, &mut self.rng) {
                    self.stats.shops_reinserted += 1;
                }
            }
        }
        if self.pools.standby_locations().len() > self.pools.standby_progression().len()
            && !self.pools.standby_items().is_empty()
            && self.rng.gen_range(0..STANDBY_RELEASE_ODDS) == 0
        {
            if let Some((location, item)) = self.pools.release_standby(&mut self.rng) {
                debug!(
                    "Released {} and {} from standby",
                    self.game_data.location_isv.keys[location], self.items[item].name
                );
                self.stats.released += 1;
            }
        }
    }

    fn event(&self, item: ItemId, location: LocationId, kind: PlacementKind) -> PlacementEvent {
        PlacementEvent {
            item,
            location,
            kind,
            order: self.pools.location_order().get(&location).copied(),
        }
    }

    fn first_pass_step(&mut self) -> FillResult<StepResult> {
        if self.pools.unplaced_progression().is_empty() || !self.pools.any_locations() {
            self.transfer_standby();
            return self.second_pass_step();
        }
        let available = self.available_count();
        if available == 0 {
            self.phase = FillPhase::Stalled;
            self.stats.stalls += 1;
            return Ok(StepResult::Stalled);
        }
        self.phase = FillPhase::Filling;
        let item = if available == 1 {
            if let Some(item) = self.force_item() {
                self.stats.forced += 1;
                item
            } else if let Some(item) = self.guess_item() {
                self.stats.guessed += 1;
                item
            } else {
                self.pools.next_item(false)?
            }
        } else {
            self.pools.next_item(true)?
        };
        let location = self
            .next_location()
            .ok_or(FillError::PoolExhausted { pool: "reachable locations" })?;

        let kind = if self.items[item].progression {
            self.pools.place_item(item, location)?;
            self.stats.placed += 1;
            self.update_reachable_locations(Some(Token::Item(item)));
            PlacementKind::Placed
        } else {
            self.pools.place_junk_item_to_standby(item, location)?;
            self.stats.deferred += 1;
            PlacementKind::Deferred
        };
        let event = self.event(item, location, kind);
        self.delinearize();
        Ok(StepResult::Placed(event))
    }

    /// First waiting progression item the player does not hold yet.
    fn next_progression(&self) -> Option<ItemId> {
        self.pools
            .unplaced_items()
            .iter()
            .chain(self.pools.unplaced_progression())
            .chain(self.pools.standby_progression())
            .copied()
            .find(|&i| self.items[i].progression && !self.state.has(Token::Item(i)))
    }

    fn random_reachable_shop(&mut self) -> Option<LocationId> {
        let shops: Vec<LocationId> = self
            .pools
            .shops()
            .into_iter()
            .filter(|s| self.reachable.contains(s))
            .collect();
        shops.choose(&mut self.rng).copied()
    }

    fn second_pass_step(&mut self) -> FillResult<StepResult> {
        if !self.pools.any_items() {
            if self.pools.any_ordinary_locations() {
                return Err(FillError::PoolExhausted { pool: "items" });
            }
            self.pools.close_shops();
            self.phase = FillPhase::Done;
            return Ok(StepResult::Done);
        }
        // Ordinary locations are filled first; shops only take what is left over.
        let next_ordinary = self
            .pools
            .unplaced_locations()
            .iter()
            .copied()
            .find(|loc| !self.pools.is_shop(*loc) && self.reachable.contains(loc));
        // With ordinary locations left but none reachable, a shop can still take
        // progression that opens them up.
        let (location, item) = match next_ordinary {
            Some(location) => (location, self.pools.next_item(false)?),
            None => {
                let item = if self.pools.any_ordinary_locations() {
                    match self.next_progression() {
                        Some(item) => item,
                        None => {
                            self.stats.stalls += 1;
                            return Ok(StepResult::Stalled);
                        }
                    }
                } else {
                    self.pools.next_item(false)?
                };
                match self.random_reachable_shop() {
                    Some(shop) => (shop, item),
                    None => {
                        self.stats.stalls += 1;
                        return Ok(StepResult::Stalled);
                    }
                }
            }
        };
        self.pools.place_item_from_standby(item, location)?;
        self.stats.placed += 1;
        if self.items[item].progression {
            self.update_reachable_locations(Some(Token::Item(item)));
        }
        Ok(StepResult::Placed(
            self.event(item, location, PlacementKind::FromStandby),
        ))
    }

    /// Runs one placement step.
    pub fn place_next(&mut self) -> FillResult<StepResult> {
        self.stats.steps += 1;
        match self.phase {
            FillPhase::Done => Ok(StepResult::Done),
            FillPhase::Filling | FillPhase::Stalled => self.first_pass_step(),
            FillPhase::StandbyReleased => self.second_pass_step(),
        }
    }

    fn defer_progression(&mut self, item: ItemId) -> FillResult<()> {
        self.pools.place_progression_to_standby(item)?;
        self.deferred_progression.insert(item);
        self.update_reachable_locations(Some(Token::Item(item)));
        self.phase = FillPhase::Filling;
        Ok(())
    }

    /// Moves a forced item to standby and grants it. Only meaningful during the first pass.
    pub fn force_step(&mut self) -> FillResult<Option<ItemId>> {
        if self.transferred {
            return Ok(None);
        }
        match self.force_item() {
            Some(item) => {
                self.stats.forced += 1;
                self.defer_progression(item)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    pub fn guess_step(&mut self) -> FillResult<Option<ItemId>> {
        if self.transferred {
            return Ok(None);
        }
        match self.guess_item() {
            Some(item) => {
                self.stats.guessed += 1;
                self.defer_progression(item)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Starts the second pass. Returns false if it already started.
    pub fn transfer_standby(&mut self) -> bool {
        if self.transferred {
            return false;
        }
        info!(
            "Transferring standby: {} items, {} locations",
            self.pools.standby_items().len() + self.pools.standby_progression().len(),
            self.pools.standby_locations().len()
        );
        self.pools.transfer_standby();
        self.transferred = true;
        self.phase = FillPhase::StandbyReleased;
        self.stats.transfers += 1;
        true
    }

    pub fn is_done(&self) -> bool {
        self.phase == FillPhase::Done
    }

    pub fn phase(&self) -> FillPhase {
        self.phase
    }

    pub fn placements(&self) -> Option<&Placements> {
        if self.is_done() {
            Some(self.pools.placements())
        } else {
            None
        }
    }

    pub fn pools(&self) -> &ItemPools {
        &self.pools
    }

    pub fn stats(&self) -> FillStats {
        self.stats
    }

    pub fn state(&self) -> &CapabilityState {
        &self.state
    }

    pub fn is_reachable(&self, location: LocationId) -> bool {
        self.reachable.contains(&location)
    }

    pub fn reachable_locations(&self) -> &HashSet<LocationId> {
        &self.reachable
    }

    pub fn randomized_locations(&self) -> &HashSet<LocationId> {
        &self.randomized
    }

    pub fn normal_fill_shops(&self) -> bool {
        self.normal_fill_shops
    }

    pub fn delinearize_shops(&self) -> bool {
        self.delinearize_shops
    }

    pub fn duplicated_items(&self) -> &[ItemId] {
        &self.duplicated_items
    }

    pub fn item_name(&self, item: ItemId) -> &str {
        &self.items[item].name
    }

    pub fn location_status(&self, location: LocationId) -> String {
        let name = &self.game_data.location_isv.keys[location];
        match self.pools.location_pool(location) {
            Some(LocationPool::Unplaced) => format!("{name} is unfilled"),
            Some(LocationPool::Standby) => format!("{name} is in standby"),
            Some(LocationPool::HeldAside) => format!("{name} is held aside"),
            Some(LocationPool::Placed) => {
                let placements = self.pools.placements();
                let items: Vec<&str> = match placements.ordinary.get(&location) {
                    Some(&item) => vec![self.item_name(item)],
                    None => placements.shops[&location]
                        .iter()
                        .map(|&i| self.item_name(i))
                        .collect(),
                };
                format!("{name} is filled with {}", items.join(", "))
            }
            None => format!("{name} was not found"),
        }
    }

    /// Progression items held by the player with no traceable source.
    pub fn data_conflicts(&self) -> Vec<ItemId> {
        let mut conflicts: Vec<ItemId> = self
            .state
            .obtained()
            .filter_map(|token| match token {
                Token::Item(i) => Some(*i),
                _ => None,
            })
            .filter(|&i| {
                !self.starting_items.contains(&i)
                    && !self.vanilla_granted.contains(&i)
                    && !self.deferred_progression.contains(&i)
                    && !self.pools.placements().contains_item(i)
            })
            .collect();
        conflicts.sort();
        for &item in &conflicts {
            warn!("Obtained {} without a placement", self.item_name(item));
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemrando_logic::{RequirementOracle, VanillaPlacements};
    use rand::SeedableRng;

    const CATALOG: &str = r#"{
        "items": [
            {"name": "A", "pool": "Key", "progression": true},
            {"name": "J", "pool": "Key"}
        ],
        "locations": [
            {"name": "L0", "pool": "Key"},
            {"name": "L1", "pool": "Key", "requires": "A"}
        ]
    }"#;

    fn engine<'a>(
        game_data: &'a GameData,
        oracle: &'a RequirementOracle<'a>,
        seed: u64,
    ) -> FillEngine<'a, rand::rngs::StdRng, RequirementOracle<'a>, VanillaPlacements> {
        let settings = FillSettings::all_pools(game_data);
        let randomized = randomized_locations(game_data, &settings).into_iter().collect();
        let vanilla = VanillaPlacements::new(game_data, &randomized);
        FillEngine::new(
            rand::rngs::StdRng::seed_from_u64(seed),
            game_data,
            oracle,
            vanilla,
            &settings,
            &StartingCapabilities::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_stall_then_force() {
        let game_data = GameData::parse(CATALOG).unwrap();
        let oracle = RequirementOracle::new(&game_data);
        let mut engine = engine(&game_data, &oracle, 0);
        // Junk went to standby at L0, leaving A unplaced with only L1 (locked) left.
        let mut pools = ItemPools::new(vec![0, 1], HashSet::new());
        pools.push_item(1, false);
        pools.push_item(0, true);
        pools.place_junk_item_to_standby(1, 0).unwrap();
        engine.pools = pools;
        assert_eq!(engine.available_count(), 0);
        assert!(!engine.is_reachable(1));

        assert_eq!(engine.place_next().unwrap(), StepResult::Stalled);
        assert_eq!(engine.phase(), FillPhase::Stalled);
        assert_eq!(engine.force_step().unwrap(), Some(0));
        assert!(engine.is_reachable(1));

        let mut steps = 0;
        while !engine.is_done() {
            match engine.place_next().unwrap() {
                StepResult::Stalled => panic!("stalled after forcing"),
                _ => steps += 1,
            }
            assert!(steps < 10);
        }
        let placements = engine.placements().unwrap();
        assert_eq!(placements.ordinary[&0], 0);
        assert_eq!(placements.ordinary[&1], 1);
        assert!(engine.data_conflicts().is_empty());
    }

    #[test]
    fn test_force_item_ignores_useless_items() {
        let game_data = GameData::parse(
            r#"{
            "items": [
                {"name": "A", "pool": "Key", "progression": true},
                {"name": "B", "pool": "Key", "progression": true, "itemCandidate": true},
                {"name": "J", "pool": "Key"}
            ],
            "locations": [
                {"name": "L0", "pool": "Key"},
                {"name": "L1", "pool": "Key", "requires": {"and": ["A", "B"]}},
                {"name": "L2", "pool": "Key", "requires": "B"}
            ]
        }"#,
        )
        .unwrap();
        let oracle = RequirementOracle::new(&game_data);
        let mut engine = engine(&game_data, &oracle, 1);
        assert_eq!(engine.force_item(), Some(1));
        assert!(!engine.state().has(Token::Item(1)));
        assert_eq!(engine.guess_item(), Some(1));
        assert!(engine.can_guess());
    }

    #[test]
    fn test_status_and_placement_snapshot() {
        let game_data = GameData::parse(CATALOG).unwrap();
        let oracle = RequirementOracle::new(&game_data);
        let mut engine = engine(&game_data, &oracle, 2);
        assert!(engine.placements().is_none());
        assert_eq!(engine.location_status(1), "L1 is unfilled");
        while !engine.is_done() {
            if engine.place_next().unwrap() == StepResult::Stalled {
                assert!(engine.force_step().unwrap().is_some());
            }
        }
        assert!(engine.placements().is_some());
        assert!(engine.location_status(0).starts_with("L0 is filled with"));
        assert_eq!(engine.place_next().unwrap(), StepResult::Done);
    }

    #[test]
    fn test_transitions_propagate_through_pairs() {
        let game_data = GameData::parse(
            r#"{
            "items": [
                {"name": "A", "pool": "Key", "progression": true},
                {"name": "J", "pool": "Key"}
            ],
            "transitions": [
                {"name": "Room[left]", "requires": "A", "pair": "Hall[right]"},
                {"name": "Hall[right]", "requires": "never", "pair": "Room[left]"}
            ],
            "locations": [
                {"name": "L0", "pool": "Key"},
                {"name": "L1", "pool": "Key", "requires": "Hall[right]"}
            ]
        }"#,
        )
        .unwrap();
        let oracle = RequirementOracle::new(&game_data);
        let settings = FillSettings {
            randomize_transitions: true,
            ..FillSettings::all_pools(&game_data)
        };
        let randomized = randomized_locations(&game_data, &settings).into_iter().collect();
        let mut engine = FillEngine::new(
            rand::rngs::StdRng::seed_from_u64(0),
            &game_data,
            &oracle,
            VanillaPlacements::new(&game_data, &randomized),
            &settings,
            &StartingCapabilities::default(),
            None,
        )
        .unwrap();
        assert!(!engine.is_reachable(1));
        // Forcing has to follow A through the transition and its pair:
        assert_eq!(engine.force_item(), Some(0));
        engine.update_reachable_locations(Some(Token::Item(0)));
        assert!(engine.state().has(Token::Transition(1)));
        assert!(engine.is_reachable(1));
    }
}
