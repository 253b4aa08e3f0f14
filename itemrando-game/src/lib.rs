// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashMap;
use json::{self, JsonValue};
use log::info;
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::fs::File;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use strum_macros::{EnumString, VariantNames};

pub type ItemId = usize; // Index into GameData.item_isv.keys: one entry per item instance
pub type LocationId = usize; // Index into GameData.location_isv.keys
pub type TransitionId = usize; // Index into GameData.transition_isv.keys
pub type SettingId = usize; // Index into GameData.setting_isv.keys: boolean logic flags (skips, modes)

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Anything a requirement expression can test for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    Item(ItemId),
    Transition(TransitionId),
    Setting(SettingId),
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, EnumString, VariantNames, Serialize, Deserialize,
)]
pub enum LocationKind {
    /// Holds exactly one item.
    #[default]
    Ordinary,
    /// Holds an ordered list of items with no fixed cap.
    Shop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemDef {
    pub name: String,
    pub pool: String,
    pub progression: bool,
    pub major_item: bool,
    pub item_candidate: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationDef {
    pub name: String,
    pub pool: String,
    pub kind: LocationKind,
    pub vanilla_item: Option<ItemId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionDef {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Free,
    Never,
    Token(Token),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Free
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Never
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }

    /// Collects every token mentioned anywhere in the expression.
    pub fn collect_tokens(&self, out: &mut Vec<Token>) {
        match self {
            Requirement::Free | Requirement::Never => {}
            Requirement::Token(token) => out.push(*token),
            Requirement::And(reqs) | Requirement::Or(reqs) => {
                for req in reqs {
                    req.collect_tokens(out);
                }
            }
        }
    }
}

// Static catalog of items, locations and transitions, along with the logic
// requirement attached to each location and transition.
#[derive(Default, Clone, Debug)]
pub struct GameData {
    pub item_isv: IndexedVec<String>,
    pub items: Vec<ItemDef>, // Corresponds to item_isv.keys
    pub location_isv: IndexedVec<String>,
    pub locations: Vec<LocationDef>, // Corresponds to location_isv.keys
    pub transition_isv: IndexedVec<String>,
    pub transitions: Vec<TransitionDef>, // Corresponds to transition_isv.keys
    pub setting_isv: IndexedVec<String>,
    pub location_requirements: Vec<Requirement>, // Corresponds to location_isv.keys
    pub transition_requirements: Vec<Requirement>, // Corresponds to transition_isv.keys
    pub transition_pairs: HashMap<TransitionId, TransitionId>,
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let json_str = std::io::read_to_string(file)
        .with_context(|| format!("unable to read {}", path.display()))?;
    let json_data =
        json::parse(&json_str).with_context(|| format!("unable to parse {}", path.display()))?;
    Ok(json_data)
}

impl GameData {
    pub fn load(catalog_path: &Path) -> Result<GameData> {
        let catalog_json = read_json(catalog_path)?;
        let game_data = Self::from_json(&catalog_json)
            .with_context(|| format!("Processing catalog {}", catalog_path.display()))?;
        info!(
            "Loaded catalog: {} items, {} locations, {} transitions, {} settings",
            game_data.items.len(),
            game_data.locations.len(),
            game_data.transitions.len(),
            game_data.setting_isv.len()
        );
        Ok(game_data)
    }

    pub fn parse(catalog_str: &str) -> Result<GameData> {
        let catalog_json = json::parse(catalog_str).context("unable to parse catalog")?;
        Self::from_json(&catalog_json)
    }

    pub fn from_json(catalog_json: &JsonValue) -> Result<GameData> {
        let mut game_data = GameData::default();
        // Names have to be registered up front, since requirements may refer forward.
        game_data.load_settings(&catalog_json["settings"])?;
        game_data.load_items(&catalog_json["items"])?;
        game_data.load_transition_names(&catalog_json["transitions"])?;
        game_data.load_locations(&catalog_json["locations"])?;
        game_data.load_transition_logic(&catalog_json["transitions"])?;
        Ok(game_data)
    }

    fn load_settings(&mut self, settings_json: &JsonValue) -> Result<()> {
        if settings_json.is_null() {
            return Ok(());
        }
        ensure!(settings_json.is_array(), "'settings' must be an array");
        for setting_json in settings_json.members() {
            let name = setting_json
                .as_str()
                .with_context(|| format!("expected setting name, got {setting_json}"))?;
            self.setting_isv.add(name);
        }
        Ok(())
    }

    fn load_items(&mut self, items_json: &JsonValue) -> Result<()> {
        ensure!(items_json.is_array(), "'items' must be an array");
        for item_json in items_json.members() {
            let name = item_json["name"]
                .as_str()
                .with_context(|| format!("missing item name in {item_json}"))?;
            if self.item_isv.index_by_key.contains_key(name) {
                bail!("Duplicate item name {name}");
            }
            self.item_isv.add(name);
            self.items.push(ItemDef {
                name: name.to_string(),
                pool: item_json["pool"]
                    .as_str()
                    .with_context(|| format!("missing pool for item {name}"))?
                    .to_string(),
                progression: item_json["progression"].as_bool().unwrap_or(false),
                major_item: item_json["majorItem"].as_bool().unwrap_or(false),
                item_candidate: item_json["itemCandidate"].as_bool().unwrap_or(false),
            });
        }
        Ok(())
    }

    fn load_transition_names(&mut self, transitions_json: &JsonValue) -> Result<()> {
        if transitions_json.is_null() {
            return Ok(());
        }
        ensure!(transitions_json.is_array(), "'transitions' must be an array");
        for transition_json in transitions_json.members() {
            let name = transition_json["name"]
                .as_str()
                .with_context(|| format!("missing transition name in {transition_json}"))?;
            if self.transition_isv.index_by_key.contains_key(name) {
                bail!("Duplicate transition name {name}");
            }
            self.transition_isv.add(name);
            self.transitions.push(TransitionDef {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn load_locations(&mut self, locations_json: &JsonValue) -> Result<()> {
        ensure!(locations_json.is_array(), "'locations' must be an array");
        for location_json in locations_json.members() {
            let name = location_json["name"]
                .as_str()
                .with_context(|| format!("missing location name in {location_json}"))?;
            if self.location_isv.index_by_key.contains_key(name) {
                bail!("Duplicate location name {name}");
            }
            let kind = match location_json["kind"].as_str() {
                Some(kind_str) => LocationKind::from_str(kind_str)
                    .with_context(|| format!("unrecognized location kind {kind_str} for {name}"))?,
                None => LocationKind::Ordinary,
            };
            let vanilla_item = match location_json["vanillaItem"].as_str() {
                Some(item_name) => Some(
                    *self
                        .item_isv
                        .index_by_key
                        .get(item_name)
                        .with_context(|| format!("unknown vanilla item {item_name} at {name}"))?,
                ),
                None => None,
            };
            let requirement = self
                .parse_requirement(&location_json["requires"])
                .with_context(|| format!("Parsing requirement for location {name}"))?;
            self.location_isv.add(name);
            self.locations.push(LocationDef {
                name: name.to_string(),
                pool: location_json["pool"]
                    .as_str()
                    .with_context(|| format!("missing pool for location {name}"))?
                    .to_string(),
                kind,
                vanilla_item,
            });
            self.location_requirements.push(requirement);
        }
        Ok(())
    }

    fn load_transition_logic(&mut self, transitions_json: &JsonValue) -> Result<()> {
        if transitions_json.is_null() {
            return Ok(());
        }
        for (i, transition_json) in transitions_json.members().enumerate() {
            let name = &self.transitions[i].name;
            let requirement = self
                .parse_requirement(&transition_json["requires"])
                .with_context(|| format!("Parsing requirement for transition {name}"))?;
            if let Some(pair_name) = transition_json["pair"].as_str() {
                let &pair_idx = self
                    .transition_isv
                    .index_by_key
                    .get(pair_name)
                    .with_context(|| format!("unknown paired transition {pair_name} for {name}"))?;
                self.transition_pairs.insert(i, pair_idx);
            }
            self.transition_requirements.push(requirement);
        }
        Ok(())
    }

    fn parse_requires_list(&self, req_jsons: &[JsonValue]) -> Result<Vec<Requirement>> {
        let mut reqs: Vec<Requirement> = Vec::new();
        for req_json in req_jsons {
            reqs.push(self.parse_requirement(req_json)?);
        }
        Ok(reqs)
    }

    fn parse_requirement(&self, req_json: &JsonValue) -> Result<Requirement> {
        if req_json.is_null() {
            return Ok(Requirement::Free);
        } else if req_json.is_string() {
            let value = req_json.as_str().unwrap();
            if value == "never" {
                return Ok(Requirement::Never);
            } else if value == "free" {
                return Ok(Requirement::Free);
            }
            return Ok(Requirement::Token(self.lookup_token(value)?));
        } else if req_json.is_array() {
            return Ok(Requirement::make_and(
                self.parse_requires_list(req_json.members().as_slice())?,
            ));
        } else if req_json.is_object() && req_json.len() == 1 {
            let (key, value) = req_json.entries().next().unwrap();
            if key == "or" {
                ensure!(value.is_array());
                return Ok(Requirement::make_or(
                    self.parse_requires_list(value.members().as_slice())?,
                ));
            } else if key == "and" {
                ensure!(value.is_array());
                return Ok(Requirement::make_and(
                    self.parse_requires_list(value.members().as_slice())?,
                ));
            }
        }
        bail!("Unable to parse requirement: {}", req_json);
    }

    pub fn lookup_token(&self, name: &str) -> Result<Token> {
        if let Some(&idx) = self.item_isv.index_by_key.get(name) {
            Ok(Token::Item(idx))
        } else if let Some(&idx) = self.transition_isv.index_by_key.get(name) {
            Ok(Token::Transition(idx))
        } else if let Some(&idx) = self.setting_isv.index_by_key.get(name) {
            Ok(Token::Setting(idx))
        } else {
            bail!("Unrecognized token name {name}")
        }
    }

    pub fn token_name(&self, token: Token) -> &str {
        match token {
            Token::Item(idx) => &self.item_isv.keys[idx],
            Token::Transition(idx) => &self.transition_isv.keys[idx],
            Token::Setting(idx) => &self.setting_isv.keys[idx],
        }
    }

    pub fn get_items_by_pool(&self, pool: &str) -> Vec<ItemId> {
        (0..self.items.len())
            .filter(|&i| self.items[i].pool == pool)
            .collect()
    }

    pub fn get_locations_by_pool(&self, pool: &str) -> Vec<LocationId> {
        (0..self.locations.len())
            .filter(|&i| self.locations[i].pool == pool)
            .collect()
    }

    pub fn shop_ids(&self) -> Vec<LocationId> {
        (0..self.locations.len())
            .filter(|&i| self.locations[i].kind == LocationKind::Shop)
            .collect()
    }

    pub fn is_shop(&self, location: LocationId) -> bool {
        self.locations[location].kind == LocationKind::Shop
    }

    /// Distinct pool names in catalog order, over items and locations.
    pub fn pool_names(&self) -> Vec<String> {
        let mut pools: IndexedVec<String> = IndexedVec::default();
        for item in &self.items {
            pools.add(&item.pool);
        }
        for location in &self.locations {
            pools.add(&location.pool);
        }
        pools.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "settings": ["ShadeSkips"],
        "items": [
            {"name": "Claw", "pool": "Skill", "progression": true, "majorItem": true, "itemCandidate": true},
            {"name": "Dash", "pool": "Skill", "progression": true},
            {"name": "Geo", "pool": "Geo"}
        ],
        "transitions": [
            {"name": "Town[left]", "requires": "free", "pair": "Path[right]"},
            {"name": "Path[right]", "requires": {"or": ["Dash", "ShadeSkips"]}, "pair": "Town[left]"}
        ],
        "locations": [
            {"name": "Claw", "pool": "Skill", "vanillaItem": "Claw"},
            {"name": "Ledge", "pool": "Geo", "requires": {"and": ["Claw", "Path[right]"]}},
            {"name": "Sly", "pool": "Shop", "kind": "Shop", "requires": ["Claw", "free"]}
        ]
    }"#;

    #[test]
    fn test_parse_catalog() -> Result<()> {
        let game_data = GameData::parse(CATALOG)?;
        assert_eq!(game_data.items.len(), 3);
        assert_eq!(game_data.locations.len(), 3);
        assert!(game_data.items[0].item_candidate);
        assert!(!game_data.items[2].progression);
        assert_eq!(game_data.locations[0].vanilla_item, Some(0));
        assert_eq!(game_data.location_requirements[0], Requirement::Free);
        assert_eq!(
            game_data.location_requirements[1],
            Requirement::And(vec![
                Requirement::Token(Token::Item(0)),
                Requirement::Token(Token::Transition(1)),
            ])
        );
        // A single remaining conjunct collapses to the token itself:
        assert_eq!(
            game_data.location_requirements[2],
            Requirement::Token(Token::Item(0))
        );
        assert_eq!(game_data.shop_ids(), vec![2]);
        assert_eq!(game_data.transition_pairs[&0], 1);
        assert_eq!(game_data.transition_pairs[&1], 0);
        assert_eq!(game_data.pool_names(), vec!["Skill", "Geo", "Shop"]);
        Ok(())
    }

    #[test]
    fn test_unknown_token_rejected() {
        let bad = r#"{
            "items": [{"name": "Claw", "pool": "Skill"}],
            "locations": [{"name": "Ledge", "pool": "Geo", "requires": "Wings"}]
        }"#;
        assert!(GameData::parse(bad).is_err());
    }

    #[test]
    fn test_make_or_short_circuits() {
        let req = Requirement::make_or(vec![
            Requirement::Never,
            Requirement::Token(Token::Setting(0)),
            Requirement::Free,
        ]);
        assert_eq!(req, Requirement::Free);
        let req = Requirement::make_and(vec![Requirement::Free, Requirement::Never]);
        assert_eq!(req, Requirement::Never);
    }
}
