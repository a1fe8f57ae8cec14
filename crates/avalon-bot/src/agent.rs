//! A seated player that plays its level-k strategy and tracks its beliefs.

use crate::error::SolverError;
use crate::solver::{GameEvidence, GameMoveSet, Perspective, RuledOut, Solver};
use avalon_core::belief::{Belief, KBeliefTensor};
use avalon_core::game::{Game, HiddenId, PlayerId};
use rand::Rng;
use std::sync::Arc;

pub struct Agent<'s, G: Game> {
    solver: &'s Solver<G>,
    player: PlayerId,
    hidden: HiddenId,
    level: usize,
    belief: Option<Belief>,
    tensor: KBeliefTensor,
}

impl<'s, G: Game> Agent<'s, G> {
    /// Agent at `level` seeded with the game's starting beliefs. Level 0 plays
    /// the base policy and keeps no belief.
    pub fn new(solver: &'s Solver<G>, player: PlayerId, hidden: HiddenId, level: usize) -> Self {
        let (belief, tensor) = if level == 0 {
            (None, solver.empty_tensor())
        } else {
            (
                Some(solver.game().initial_belief(player, hidden)),
                KBeliefTensor::initial(solver.game(), level - 1),
            )
        };
        Self {
            solver,
            player,
            hidden,
            level,
            belief,
            tensor,
        }
    }

    /// Agent with an explicit belief and tensor; the level follows the tensor.
    pub fn with_beliefs(
        solver: &'s Solver<G>,
        player: PlayerId,
        hidden: HiddenId,
        belief: Belief,
        tensor: KBeliefTensor,
    ) -> Self {
        Self {
            solver,
            player,
            hidden,
            level: tensor.depth() + 1,
            belief: Some(belief),
            tensor,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn hidden(&self) -> HiddenId {
        self.hidden
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn belief(&self) -> Option<&Belief> {
        self.belief.as_ref()
    }

    pub fn tensor(&self) -> &KBeliefTensor {
        &self.tensor
    }

    pub fn strategy(&self, state: &G::State) -> Result<Arc<GameMoveSet<G>>, SolverError> {
        self.solver
            .solve(state, self.player, self.hidden, self.belief.as_ref(), &self.tensor)
    }

    /// Samples a move from the current strategy; `None` once the game is over.
    pub fn choose<R: Rng + ?Sized>(
        &self,
        state: &G::State,
        rng: &mut R,
    ) -> Result<Option<G::Move>, SolverError> {
        let strategy = self.strategy(state)?;
        Ok(strategy.sample(rng).cloned())
    }

    /// Folds the evidence revealed at `state` into the belief and then the
    /// tensor. Level-0 agents ignore it.
    ///
    /// Returns the tensor entries whose modeled player could not explain the
    /// evidence; they keep their previous belief.
    pub fn observe(
        &mut self,
        state: &G::State,
        own_move: Option<G::Move>,
        evidence: &GameEvidence<G>,
    ) -> Result<Vec<RuledOut>, SolverError> {
        let Some(belief) = self.belief.as_ref() else {
            return Ok(Vec::new());
        };
        let perspective = Perspective {
            player: self.player,
            own_move,
        };
        let next_belief =
            self.solver
                .update_belief(belief, &perspective, state, evidence, &self.tensor)?;
        let update = self.solver.update_k_tensor(&self.tensor, state, evidence)?;
        self.belief = Some(next_belief);
        self.tensor = update.tensor;
        Ok(update.ruled_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::solver::Evidence;
    use avalon_core::proposal::{
        ProposalGame, ProposalMove, ProposalObservation, ProposalRules, ProposalState, Team,
    };
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn solver() -> Solver<ProposalGame> {
        Solver::new(ProposalGame::new(ProposalRules::default()), SolverConfig::default()).unwrap()
    }

    #[test]
    fn level_sets_belief_and_tensor_depth() {
        let solver = solver();
        let zero = Agent::new(&solver, 0, 1, 0);
        assert!(zero.belief().is_none());
        assert!(zero.tensor().is_empty());
        let two = Agent::new(&solver, 0, 1, 2);
        assert_eq!(two.level(), 2);
        assert_eq!(two.tensor().depth(), 1);
        assert_eq!(two.belief(), Some(&solver.game().initial_belief(0, 1)));
    }

    #[test]
    fn level_zero_ignores_evidence() {
        let solver = solver();
        let mut agent = Agent::new(&solver, 1, 1, 0);
        let state = ProposalState::default().with_proposal(Team::from_members(&[1, 2]).unwrap());
        agent
            .observe(
                &state,
                Some(ProposalMove::Fail),
                &Evidence::Public(ProposalObservation::Mission { fails: 1 }),
            )
            .unwrap();
        assert!(agent.belief().is_none());
    }

    #[test]
    fn observing_a_failed_mission_shifts_suspicion() {
        let solver = solver();
        let mut agent = Agent::new(&solver, 0, 1, 1);
        let state = ProposalState::default().with_proposal(Team::from_members(&[1, 2]).unwrap());
        agent
            .observe(
                &state,
                Some(ProposalMove::Observe),
                &Evidence::Public(ProposalObservation::Mission { fails: 1 }),
            )
            .unwrap();
        let belief = agent.belief().unwrap();
        assert_eq!(belief.prob(0), 0.0);
        assert!((belief.prob(1) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn contradicted_models_are_returned() {
        let solver = solver();
        let mut agent = Agent::new(&solver, 0, 1, 2);
        let prior = agent.tensor().clone();
        let state = ProposalState::default().with_proposal(Team::from_members(&[1, 2]).unwrap());
        // Level-1 players may both fail; their level-0 models never do.
        let ruled_out = agent
            .observe(
                &state,
                Some(ProposalMove::Observe),
                &Evidence::Public(ProposalObservation::Mission { fails: 2 }),
            )
            .unwrap();

        let belief = agent.belief().unwrap();
        assert!(belief.is_valid());
        assert_eq!(belief.prob(0), 0.0);
        assert_eq!(ruled_out.len(), 9);
        for (hidden, player) in [(1, 0), (2, 1)] {
            let entry = RuledOut {
                layer: 0,
                hidden,
                player,
            };
            assert!(ruled_out.contains(&entry));
            assert_eq!(agent.tensor().belief(0, hidden, player), prior.belief(0, hidden, player));
        }
    }

    #[test]
    fn consistent_evidence_rules_nothing_out() {
        let solver = solver();
        let mut agent = Agent::new(&solver, 0, 1, 2);
        let state = ProposalState::default().with_proposal(Team::from_members(&[0, 1]).unwrap());
        let ruled_out = agent
            .observe(
                &state,
                Some(ProposalMove::Pass),
                &Evidence::Public(ProposalObservation::Mission { fails: 0 }),
            )
            .unwrap();
        assert!(ruled_out.is_empty());
    }

    #[test]
    fn choose_returns_a_legal_move() {
        let solver = solver();
        let agent = Agent::new(&solver, 0, 2, 1);
        let state = solver.game().initial_state();
        let mut rng = StdRng::seed_from_u64(5);
        let chosen = agent.choose(&state, &mut rng).unwrap().unwrap();
        assert!(solver.game().legal_moves(0, &state, 2).contains(&chosen));
    }
}
