use crate::CapabilityState;
use itemrando_game::Requirement;

pub fn requirement_met(req: &Requirement, state: &CapabilityState) -> bool {
    match req {
        Requirement::Free => true,
        Requirement::Never => false,
        Requirement::Token(token) => state.has(*token),
        Requirement::And(reqs) => reqs.iter().all(|r| requirement_met(r, state)),
        Requirement::Or(reqs) => reqs.iter().any(|r| requirement_met(r, state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemrando_game::Token;

    #[test]
    fn test_requirement_met() {
        let req = Requirement::make_and(vec![
            Requirement::Token(Token::Item(0)),
            Requirement::make_or(vec![
                Requirement::Token(Token::Item(1)),
                Requirement::Token(Token::Setting(0)),
            ]),
        ]);
        let mut state = CapabilityState::new();
        assert!(!requirement_met(&req, &state));
        state.add(Token::Item(0));
        assert!(!requirement_met(&req, &state));
        state.add_temp(Token::Setting(0));
        assert!(requirement_met(&req, &state));
        state.remove_temp();
        assert!(!requirement_met(&req, &state));
        assert!(requirement_met(&Requirement::Free, &state));
        assert!(!requirement_met(&Requirement::Never, &state));
    }
}
