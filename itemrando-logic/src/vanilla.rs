use crate::VanillaLocationManager;
use hashbrown::{HashMap, HashSet};
use itemrando_game::{GameData, ItemId, LocationId, Token};
use log::debug;

/// Non-randomized locations whose vanilla item is progression. Reaching one
/// hands its item to the player.
#[derive(Clone, Debug, Default)]
pub struct VanillaPlacements {
    progression_locations: Vec<LocationId>,
    vanilla_items: HashMap<LocationId, ItemId>,
    collected: HashSet<LocationId>,
}

impl VanillaPlacements {
    pub fn new(game_data: &GameData, randomized_locations: &HashSet<LocationId>) -> Self {
        let mut progression_locations = vec![];
        let mut vanilla_items = HashMap::new();
        for (location_id, location) in game_data.locations.iter().enumerate() {
            if randomized_locations.contains(&location_id) {
                continue;
            }
            if let Some(item_id) = location.vanilla_item {
                if game_data.items[item_id].progression {
                    progression_locations.push(location_id);
                    vanilla_items.insert(location_id, item_id);
                }
            }
        }
        VanillaPlacements {
            progression_locations,
            vanilla_items,
            collected: HashSet::new(),
        }
    }

    pub fn vanilla_item(&self, location: LocationId) -> Option<ItemId> {
        self.vanilla_items.get(&location).copied()
    }
}

impl VanillaLocationManager for VanillaPlacements {
    fn progression_locations(&self) -> Vec<LocationId> {
        self.progression_locations.clone()
    }

    fn update_vanilla_location(&mut self, location: LocationId) -> Vec<Token> {
        if !self.collected.insert(location) {
            return vec![];
        }
        match self.vanilla_items.get(&location) {
            Some(&item_id) => {
                debug!("Vanilla location {location} yields item {item_id}");
                vec![Token::Item(item_id)]
            }
            None => vec![],
        }
    }
}
