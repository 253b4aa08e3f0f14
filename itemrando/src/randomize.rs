use hashbrown::{HashMap, HashSet};
use itemrando_game::{GameData, ItemId, LocationId};
use itemrando_logic::{ReachabilityOracle, VanillaLocationManager, VanillaPlacements};
use log::{info, warn};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{FillError, FillResult};
use crate::fill::{AugmentFn, FillEngine, FillStats, StepResult};
use crate::pool::{serialize_sorted, Placements};
use crate::selection::randomized_locations;
use crate::settings::{FillSettings, StartingCapabilities};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlacedLocation {
    pub location: String,
    pub items: Vec<String>,
    pub order: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Randomization {
    pub seed: usize,
    pub placements: Placements,
    #[serde(serialize_with = "serialize_sorted")]
    pub location_order: HashMap<LocationId, usize>,
    pub spoiler: Vec<PlacedLocation>,
    pub duplicated_items: Vec<String>,
    pub stats: FillStats,
}

pub struct Randomizer<'r, O: ReachabilityOracle> {
    pub game_data: &'r GameData,
    pub oracle: &'r O,
    pub settings: &'r FillSettings,
    pub starting: StartingCapabilities,
    pub augment: Option<Box<AugmentFn<'r>>>,
}

impl<'r, O: ReachabilityOracle> Randomizer<'r, O> {
    pub fn new(
        game_data: &'r GameData,
        oracle: &'r O,
        settings: &'r FillSettings,
    ) -> FillResult<Randomizer<'r, O>> {
        let starting = settings.starting_capabilities(game_data)?;
        Ok(Randomizer {
            game_data,
            oracle,
            settings,
            starting,
            augment: None,
        })
    }

    pub fn with_augment(
        mut self,
        augment: impl Fn(HashSet<ItemId>) -> HashSet<ItemId> + 'r,
    ) -> Self {
        self.augment = Some(Box::new(augment));
        self
    }

    pub fn randomize(&self, attempt_num_rando: usize, seed: usize) -> FillResult<Randomization> {
        let mut rng_seed = [0u8; 32];
        rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
        let rng = rand::rngs::StdRng::from_seed(rng_seed);

        let randomized: HashSet<LocationId> = randomized_locations(self.game_data, self.settings)
            .into_iter()
            .collect();
        let vanilla = VanillaPlacements::new(self.game_data, &randomized);
        let mut engine = FillEngine::new(
            rng,
            self.game_data,
            self.oracle,
            vanilla,
            self.settings,
            &self.starting,
            self.augment.as_deref(),
        )?;
        info!(
            "[attempt {attempt_num_rando}] {} randomized locations, {} reachable at start, shops on first pass: {}",
            randomized.len(),
            engine.reachable_locations().len(),
            engine.normal_fill_shops()
        );

        let mut step_num = 0;
        while !engine.is_done() {
            step_num += 1;
            if step_num > self.settings.max_steps {
                return Err(FillError::UnsolvableConfiguration(format!(
                    "[attempt {attempt_num_rando}] exceeded {} steps",
                    self.settings.max_steps
                )));
            }
            match engine.place_next()? {
                StepResult::Placed(event) => {
                    let pools = engine.pools();
                    info!(
                        "[attempt {attempt_num_rando}] step={step_num}, reachable={}, placed={}, standby={}, {:?} {} at {}",
                        engine.reachable_locations().len(),
                        pools.placements().item_count(),
                        pools.standby_locations().len(),
                        event.kind,
                        engine.item_name(event.item),
                        self.game_data.location_isv.keys[event.location]
                    );
                }
                StepResult::Stalled => {
                    if let Some(item) = engine.force_step()? {
                        info!(
                            "[attempt {attempt_num_rando}] step={step_num}, stalled; forced {}",
                            engine.item_name(item)
                        );
                    } else if let Some(item) = engine.guess_step()? {
                        info!(
                            "[attempt {attempt_num_rando}] step={step_num}, stalled; guessed {}",
                            engine.item_name(item)
                        );
                    } else if engine.transfer_standby() {
                        info!("[attempt {attempt_num_rando}] step={step_num}, stalled; releasing standby");
                    } else {
                        for &location in engine.pools().unplaced_locations() {
                            warn!("[attempt {attempt_num_rando}] {}", engine.location_status(location));
                        }
                        return Err(FillError::UnsolvableConfiguration(format!(
                            "[attempt {attempt_num_rando}] no reachable location for {} remaining locations",
                            engine.pools().unplaced_locations().len()
                        )));
                    }
                }
                StepResult::Done => {}
            }
        }

        let conflicts = engine.data_conflicts();
        if !conflicts.is_empty() {
            return Err(FillError::PoolExhausted {
                pool: "placement record",
            });
        }
        let stats = engine.stats();
        info!("[attempt {attempt_num_rando}] Fill complete: {stats:?}");
        Ok(self.make_randomization(seed, &engine))
    }

    fn make_randomization<R: Rng, V: VanillaLocationManager>(
        &self,
        seed: usize,
        engine: &FillEngine<'_, R, O, V>,
    ) -> Randomization {
        let pools = engine.pools();
        let placements = pools.placements().clone();
        let location_order = pools.location_order().clone();
        let mut spoiler: Vec<PlacedLocation> = vec![];
        let mut locations: Vec<LocationId> = placements
            .ordinary
            .keys()
            .chain(placements.shops.keys())
            .copied()
            .collect();
        locations.sort_by_key(|loc| (location_order.get(loc).copied(), *loc));
        for location in locations {
            let items: Vec<String> = match placements.ordinary.get(&location) {
                Some(&item) => vec![engine.item_name(item).to_string()],
                None => placements.shops[&location]
                    .iter()
                    .map(|&i| engine.item_name(i).to_string())
                    .collect(),
            };
            spoiler.push(PlacedLocation {
                location: self.game_data.location_isv.keys[location].clone(),
                items,
                order: location_order.get(&location).copied(),
            });
        }
        Randomization {
            seed,
            placements,
            location_order,
            spoiler,
            duplicated_items: engine
                .duplicated_items()
                .iter()
                .map(|&i| engine.item_name(i).to_string())
                .collect(),
            stats: engine.stats(),
        }
    }
}
