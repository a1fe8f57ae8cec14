use super::record::ProposalError;
use super::state::{Assignment, ProposalMove, ProposalObservation, ProposalState};
use super::team::Team;
use crate::belief::Belief;
use crate::game::{Game, HiddenId, PlayerId, cartesian};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Table parameters for a proposal game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalRules {
    pub players: usize,
    pub rounds: u8,
    pub team_size: usize,
    /// Probability the adversary's level-0 policy fails a mission it sits on.
    pub sabotage: f64,
}

impl Default for ProposalRules {
    fn default() -> Self {
        Self {
            players: 3,
            rounds: 3,
            team_size: 2,
            sabotage: 0.995,
        }
    }
}

impl ProposalRules {
    pub fn validate(&self) -> Result<(), ProposalError> {
        if self.players < 2 || self.players > Team::MAX_PLAYERS {
            return Err(ProposalError::InvalidRules(format!(
                "players must be in 2..={}, got {}",
                Team::MAX_PLAYERS,
                self.players
            )));
        }
        if self.team_size == 0 || self.team_size > self.players {
            return Err(ProposalError::InvalidRules(format!(
                "team_size must be in 1..={}, got {}",
                self.players, self.team_size
            )));
        }
        if self.rounds == u8::MAX {
            return Err(ProposalError::InvalidRules("rounds must leave room for the accusation".into()));
        }
        if !(0.0..=1.0).contains(&self.sabotage) {
            return Err(ProposalError::InvalidRules(format!(
                "sabotage must be a probability, got {}",
                self.sabotage
            )));
        }
        Ok(())
    }
}

/// Single-adversary team-proposal game.
#[derive(Debug, Clone)]
pub struct ProposalGame {
    rules: ProposalRules,
    assignments: Vec<Assignment>,
    teams: Vec<Team>,
}

impl ProposalGame {
    /// Builds the game; rules are assumed valid (see [`ProposalGame::try_new`]).
    pub fn new(rules: ProposalRules) -> Self {
        debug_assert!(rules.validate().is_ok(), "invalid proposal rules");
        let assignments = (0..rules.players)
            .map(|adversary| Assignment { adversary })
            .collect();
        let teams = Team::all_of_size(rules.players, rules.team_size);
        Self {
            rules,
            assignments,
            teams,
        }
    }

    pub fn try_new(rules: ProposalRules) -> Result<Self, ProposalError> {
        rules.validate()?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &ProposalRules {
        &self.rules
    }

    /// Teams the proposer may choose from, in lexicographic order.
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn adversary(&self, hidden: HiddenId) -> PlayerId {
        self.assignments[hidden].adversary
    }

    /// Draws the concealed assignment for a new game.
    pub fn deal_hidden<R: Rng + ?Sized>(&self, rng: &mut R) -> HiddenId {
        rng.gen_range(0..self.assignments.len())
    }

    pub fn is_accusation(&self, state: &ProposalState) -> bool {
        state.round == self.rules.rounds
    }

    fn proposed_team(&self, state: &ProposalState, joint: &[ProposalMove]) -> Option<Team> {
        match joint.get(state.proposer(self.rules.players)) {
            Some(ProposalMove::Propose(team)) => Some(*team),
            _ => None,
        }
    }

    fn mission_fails(joint: &[ProposalMove]) -> u8 {
        joint
            .iter()
            .filter(|m| matches!(m, ProposalMove::Fail))
            .count() as u8
    }

    fn loyal_payoff(&self, state: &ProposalState, hidden: HiddenId, joint: &[ProposalMove]) -> f64 {
        if self.is_accusation(state) {
            let adversary = self.adversary(hidden);
            let correct = joint
                .iter()
                .filter(|m| **m == ProposalMove::Pick(Some(adversary)))
                .count() as f64;
            let abstain = joint
                .iter()
                .filter(|m| **m == ProposalMove::Pick(None))
                .count() as f64;
            return 10.0 * correct - 100.0 * (self.rules.players as f64 - correct - abstain);
        }
        if state.proposal.is_none() {
            return 0.0;
        }
        if Self::mission_fails(joint) > 0 { -1.0 } else { 1.0 }
    }
}

impl Game for ProposalGame {
    type State = ProposalState;
    type Move = ProposalMove;
    type Observation = ProposalObservation;
    type Hidden = Assignment;

    fn player_count(&self) -> usize {
        self.rules.players
    }

    fn hidden_states(&self) -> &[Assignment] {
        &self.assignments
    }

    fn initial_state(&self) -> ProposalState {
        ProposalState::default()
    }

    fn legal_moves(&self, player: PlayerId, state: &ProposalState, hidden: HiddenId) -> Vec<ProposalMove> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        if self.is_accusation(state) {
            if self.adversary(hidden) == player {
                return vec![ProposalMove::Pick(None)];
            }
            return std::iter::once(ProposalMove::Pick(None))
                .chain((0..self.rules.players).map(|p| ProposalMove::Pick(Some(p))))
                .collect();
        }
        if let Some(team) = state.proposal {
            if team.contains(player) {
                return vec![ProposalMove::Pass, ProposalMove::Fail];
            }
            return vec![ProposalMove::Observe];
        }
        if state.proposer(self.rules.players) == player {
            return self.teams.iter().copied().map(ProposalMove::Propose).collect();
        }
        vec![ProposalMove::Observe]
    }

    fn transition(&self, state: &ProposalState, _hidden: HiddenId, joint: &[ProposalMove]) -> ProposalState {
        if self.is_terminal(state) {
            return *state;
        }
        if self.is_accusation(state) {
            return state.after_accusation();
        }
        if state.proposal.is_some() {
            return state.after_mission(Self::mission_fails(joint) > 0);
        }
        match self.proposed_team(state, joint) {
            Some(team) => state.with_proposal(team),
            None => {
                debug_assert!(false, "proposer did not propose in {state}");
                *state
            }
        }
    }

    fn observation(
        &self,
        state: &ProposalState,
        _hidden: HiddenId,
        joint: &[ProposalMove],
    ) -> ProposalObservation {
        if self.is_terminal(state) || self.is_accusation(state) {
            return ProposalObservation::Concluded;
        }
        if state.proposal.is_some() {
            return ProposalObservation::Mission {
                fails: Self::mission_fails(joint),
            };
        }
        ProposalObservation::Proposed(self.proposed_team(state, joint).unwrap_or(Team::EMPTY))
    }

    fn reward(&self, state: &ProposalState, hidden: HiddenId, joint: &[ProposalMove]) -> Vec<f64> {
        let payoff = self.loyal_payoff(state, hidden, joint);
        let adversary = self.adversary(hidden);
        (0..self.rules.players)
            .map(|p| if p == adversary { -payoff } else { payoff })
            .collect()
    }

    fn is_terminal(&self, state: &ProposalState) -> bool {
        state.round > self.rules.rounds
    }

    fn infer_action_sets(
        &self,
        state: &ProposalState,
        observation: &ProposalObservation,
        hidden: HiddenId,
    ) -> Vec<Vec<ProposalMove>> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        if self.is_accusation(state) {
            if *observation != ProposalObservation::Concluded {
                return Vec::new();
            }
            let per_player: Vec<Vec<ProposalMove>> = (0..self.rules.players)
                .map(|p| self.legal_moves(p, state, hidden))
                .collect();
            return cartesian(&per_player);
        }
        match (state.proposal, observation) {
            (None, ProposalObservation::Proposed(team)) if self.teams.contains(team) => {
                let proposer = state.proposer(self.rules.players);
                let joint = (0..self.rules.players)
                    .map(|p| {
                        if p == proposer {
                            ProposalMove::Propose(*team)
                        } else {
                            ProposalMove::Observe
                        }
                    })
                    .collect();
                vec![joint]
            }
            (Some(team), ProposalObservation::Mission { fails }) => {
                let per_player: Vec<Vec<ProposalMove>> = (0..self.rules.players)
                    .map(|p| {
                        if team.contains(p) {
                            vec![ProposalMove::Pass, ProposalMove::Fail]
                        } else {
                            vec![ProposalMove::Observe]
                        }
                    })
                    .collect();
                cartesian(&per_player)
                    .into_iter()
                    .filter(|joint| Self::mission_fails(joint) == *fails)
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn initial_belief(&self, player: PlayerId, hidden: HiddenId) -> Belief {
        let count = self.assignments.len();
        if self.adversary(hidden) == player {
            return Belief::point(count, hidden);
        }
        let weights: Vec<f64> = self
            .assignments
            .iter()
            .map(|a| if a.adversary == player { 0.0 } else { 1.0 })
            .collect();
        Belief::from_weights(weights).unwrap_or_else(|_| Belief::uniform(count))
    }

    fn base_policy(&self, player: PlayerId, state: &ProposalState, hidden: HiddenId) -> Vec<(ProposalMove, f64)> {
        let legal = self.legal_moves(player, state, hidden);
        if legal.is_empty() {
            return Vec::new();
        }
        if !self.is_accusation(state) && state.proposal.is_some_and(|team| team.contains(player)) {
            let sabotage = if self.adversary(hidden) == player {
                self.rules.sabotage
            } else {
                0.0
            };
            return vec![
                (ProposalMove::Pass, 1.0 - sabotage),
                (ProposalMove::Fail, sabotage),
            ];
        }
        let mass = 1.0 / legal.len() as f64;
        legal.into_iter().map(|m| (m, mass)).collect()
    }
}
