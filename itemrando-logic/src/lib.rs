pub mod helpers;
pub mod oracle;
pub mod vanilla;

use hashbrown::HashSet;
use itemrando_game::{LocationId, Token, TransitionId};

pub use oracle::RequirementOracle;
pub use vanilla::VanillaPlacements;

/// The set of logic tokens obtained so far, plus a temporary overlay used for
/// speculative checks.
///
/// Permanent tokens only ever accumulate. Each permanent addition is also
/// recorded in a "recent" batch, which reachability propagation drains so that
/// the oracle only has to consider requirements touched by the new tokens.
#[derive(Clone, Debug, Default)]
pub struct CapabilityState {
    obtained: HashSet<Token>,
    recent: Vec<Token>,
    temp: HashSet<Token>,
    temp_order: Vec<Token>,
}

impl CapabilityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, token: Token) -> bool {
        self.obtained.contains(&token) || self.temp.contains(&token)
    }

    /// Adds a permanent token. Returns false if it was already held.
    pub fn add(&mut self, token: Token) -> bool {
        if self.obtained.insert(token) {
            self.recent.push(token);
            true
        } else {
            false
        }
    }

    /// Adds a speculative token, to be discarded by `remove_temp`.
    pub fn add_temp(&mut self, token: Token) -> bool {
        if self.has(token) {
            return false;
        }
        self.temp.insert(token);
        self.temp_order.push(token);
        true
    }

    pub fn temp_tokens(&self) -> &[Token] {
        &self.temp_order
    }

    pub fn remove_temp(&mut self) {
        self.temp.clear();
        self.temp_order.clear();
    }

    pub fn take_recent(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.recent)
    }

    pub fn has_permanent(&self, token: Token) -> bool {
        self.obtained.contains(&token)
    }

    pub fn obtained(&self) -> impl Iterator<Item = &Token> {
        self.obtained.iter()
    }

    pub fn len(&self) -> usize {
        self.obtained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obtained.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Location(LocationId),
    Transition(TransitionId),
}

/// Answers reachability questions for the fill engine.
///
/// `can_reach` must be a pure function of the capability state (including its
/// temporary overlay). The `*_unlocked_by` queries may over-approximate: the
/// engine re-checks every candidate with `can_reach`. Results are expected in
/// a deterministic order so that fills are reproducible.
pub trait ReachabilityOracle {
    fn can_reach(&self, state: &CapabilityState, target: Target) -> bool;
    fn locations_unlocked_by(&self, recent: &[Token]) -> Vec<LocationId>;
    fn transitions_unlocked_by(&self, recent: &[Token]) -> Vec<TransitionId>;
}

/// Tracks locations that keep their original item but still matter for logic.
pub trait VanillaLocationManager {
    fn progression_locations(&self) -> Vec<LocationId>;

    /// Called when one of the progression locations becomes reachable; returns
    /// the tokens the player gains from it.
    fn update_vanilla_location(&mut self, location: LocationId) -> Vec<Token>;
}
