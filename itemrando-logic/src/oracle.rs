use crate::helpers::requirement_met;
use crate::{CapabilityState, ReachabilityOracle, Target};
use hashbrown::HashMap;
use itemrando_game::{GameData, LocationId, Token, TransitionId};

/// Reachability oracle backed by the catalog's requirement expressions.
///
/// Keeps an inverted index from each token to the locations and transitions
/// whose requirement mentions it, so that "what might have opened up" only
/// touches requirements that depend on the recently added tokens.
pub struct RequirementOracle<'a> {
    game_data: &'a GameData,
    locations_by_token: HashMap<Token, Vec<LocationId>>,
    transitions_by_token: HashMap<Token, Vec<TransitionId>>,
}

impl<'a> RequirementOracle<'a> {
    pub fn new(game_data: &'a GameData) -> Self {
        let mut locations_by_token: HashMap<Token, Vec<LocationId>> = HashMap::new();
        for (location_id, req) in game_data.location_requirements.iter().enumerate() {
            let mut tokens: Vec<Token> = vec![];
            req.collect_tokens(&mut tokens);
            tokens.sort();
            tokens.dedup();
            for token in tokens {
                locations_by_token.entry(token).or_default().push(location_id);
            }
        }
        let mut transitions_by_token: HashMap<Token, Vec<TransitionId>> = HashMap::new();
        for (transition_id, req) in game_data.transition_requirements.iter().enumerate() {
            let mut tokens: Vec<Token> = vec![];
            req.collect_tokens(&mut tokens);
            tokens.sort();
            tokens.dedup();
            for token in tokens {
                transitions_by_token
                    .entry(token)
                    .or_default()
                    .push(transition_id);
            }
        }
        RequirementOracle {
            game_data,
            locations_by_token,
            transitions_by_token,
        }
    }
}

fn lookup_dependents(index: &HashMap<Token, Vec<usize>>, recent: &[Token]) -> Vec<usize> {
    let mut out: Vec<usize> = vec![];
    for token in recent {
        if let Some(ids) = index.get(token) {
            out.extend(ids);
        }
    }
    out.sort();
    out.dedup();
    out
}

impl ReachabilityOracle for RequirementOracle<'_> {
    fn can_reach(&self, state: &CapabilityState, target: Target) -> bool {
        match target {
            Target::Location(id) => {
                requirement_met(&self.game_data.location_requirements[id], state)
            }
            Target::Transition(id) => {
                requirement_met(&self.game_data.transition_requirements[id], state)
            }
        }
    }

    fn locations_unlocked_by(&self, recent: &[Token]) -> Vec<LocationId> {
        lookup_dependents(&self.locations_by_token, recent)
    }

    fn transitions_unlocked_by(&self, recent: &[Token]) -> Vec<TransitionId> {
        lookup_dependents(&self.transitions_by_token, recent)
    }
}
