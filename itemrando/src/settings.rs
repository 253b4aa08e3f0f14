use std::path::Path;

use anyhow::{Context, Result};
use itemrando_game::{GameData, ItemId, SettingId};
use serde::{Deserialize, Serialize};

use crate::error::{FillError, FillResult};

fn default_max_steps() -> usize {
    10000
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FillSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub randomized_pools: Vec<String>,
    #[serde(default)]
    pub split_pools: Vec<SplitPoolSetting>,
    #[serde(default)]
    pub starting_items: Vec<String>,
    #[serde(default)]
    pub logic_flags: Vec<String>,
    #[serde(default)]
    pub randomize_transitions: bool,
    #[serde(default)]
    pub duplicate_major_items: bool,
    #[serde(default)]
    pub cursed: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

// A pool that splits up some entries of a parent pool (e.g. one upgrade broken
// into a left and right half). It only applies while the parent pool is also
// randomized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SplitPoolSetting {
    pub pool: String,
    pub parent_pool: String,
    #[serde(default)]
    pub replaces: Vec<String>,
    #[serde(default)]
    pub omit_one_of: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartingCapabilities {
    pub items: Vec<ItemId>,
    pub flags: Vec<SettingId>,
}

impl Default for FillSettings {
    fn default() -> Self {
        FillSettings {
            name: None,
            randomized_pools: vec![],
            split_pools: vec![],
            starting_items: vec![],
            logic_flags: vec![],
            randomize_transitions: false,
            duplicate_major_items: false,
            cursed: false,
            max_steps: default_max_steps(),
        }
    }
}

impl FillSettings {
    pub fn load(path: &Path) -> Result<FillSettings> {
        let settings_str = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read settings file at {}", path.display()))?;
        serde_json::from_str(&settings_str)
            .with_context(|| format!("Unable to parse settings file at {}", path.display()))
    }

    /// Settings randomizing every pool named in the catalog.
    pub fn all_pools(game_data: &GameData) -> FillSettings {
        FillSettings {
            randomized_pools: game_data.pool_names(),
            ..FillSettings::default()
        }
    }

    pub fn is_pool_randomized(&self, pool: &str) -> bool {
        self.randomized_pools.iter().any(|p| p == pool)
    }

    pub fn starting_capabilities(&self, game_data: &GameData) -> FillResult<StartingCapabilities> {
        let mut items = vec![];
        for name in &self.starting_items {
            match game_data.item_isv.index_by_key.get(name) {
                Some(&idx) => items.push(idx),
                None => {
                    return Err(FillError::InvalidSettingsCombination(format!(
                        "unknown starting item {name}"
                    )))
                }
            }
        }
        let mut flags = vec![];
        for name in &self.logic_flags {
            match game_data.setting_isv.index_by_key.get(name) {
                Some(&idx) => flags.push(idx),
                None => {
                    return Err(FillError::InvalidSettingsCombination(format!(
                        "unknown logic flag {name}"
                    )))
                }
            }
        }
        Ok(StartingCapabilities { items, flags })
    }
}
