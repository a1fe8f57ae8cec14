//! Recursive level-k strategy solver.
//!
//! A query without a belief is answered by the game's level-0 policy. With a
//! belief, the player is at level `tensor.depth() + 1`: every other player is
//! modeled one level down using the beliefs stored in the tensor, and the
//! player softmax-responds to the values those models imply.

mod memo;
mod moveset;
mod softmax;
mod update;

pub use memo::{Memo, MemoStats};
pub use moveset::{MoveEntry, MoveSet};
pub use softmax::{TIE_TOLERANCE, best_response, softmax, tremble};
pub use update::{Evidence, Perspective, RuledOut, TensorUpdate};

use crate::config::SolverConfig;
use crate::error::SolverError;
use crate::oracle::LeafEvaluator;
use avalon_core::belief::{BELIEF_TOLERANCE, Belief, KBeliefTensor};
use avalon_core::game::{Game, HiddenId, PlayerId, cartesian};
use std::sync::Arc;
use tracing::{Level, event};
use update::{BeliefKey, TensorKey};

pub type GameEvidence<G> = Evidence<<G as Game>::Move, <G as Game>::Observation>;
pub type GamePerspective<G> = Perspective<<G as Game>::Move>;
pub type GameMoveSet<G> = MoveSet<<G as Game>::Move>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SolveKey<S> {
    state: S,
    player: PlayerId,
    // Only level-0 answers depend on the caller's own hidden state.
    hidden: Option<HiddenId>,
    belief: Option<Belief>,
    tensor: KBeliefTensor,
    remaining: Option<u32>,
}

/// Memo counters for the three solver tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub solves: MemoStats,
    pub belief_updates: MemoStats,
    pub tensor_updates: MemoStats,
}

/// Solver bound to one game. Results are cached for the lifetime of the
/// instance; use a fresh solver (or [`Solver::clear`]) per independent query.
pub struct Solver<G: Game> {
    game: G,
    config: SolverConfig,
    leaf: Option<Box<dyn LeafEvaluator<G>>>,
    solves: Memo<SolveKey<G::State>, Arc<GameMoveSet<G>>>,
    beliefs: Memo<BeliefKey<G::State, G::Move, G::Observation>, Belief>,
    tensors: Memo<TensorKey<G::State, G::Move, G::Observation>, TensorUpdate>,
}

impl<G: Game> Solver<G> {
    pub fn new(game: G, config: SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        Ok(Self {
            game,
            config,
            leaf: None,
            solves: Memo::new(config.memoize),
            beliefs: Memo::new(config.memoize),
            tensors: Memo::new(config.memoize),
        })
    }

    /// Attaches the evaluator consulted when the horizon runs out.
    pub fn with_leaf_evaluator<E>(mut self, evaluator: E) -> Self
    where
        E: LeafEvaluator<G> + 'static,
    {
        self.leaf = Some(Box::new(evaluator));
        self
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn hidden_count(&self) -> usize {
        self.game.hidden_states().len()
    }

    /// Reasoning level implied by a query's belief and tensor.
    pub fn level(belief: Option<&Belief>, tensor: &KBeliefTensor) -> usize {
        match belief {
            None => 0,
            Some(_) => tensor.depth() + 1,
        }
    }

    /// Empty tensor sized for this game.
    pub fn empty_tensor(&self) -> KBeliefTensor {
        KBeliefTensor::empty(self.hidden_count(), self.game.player_count())
    }

    pub fn stats(&self) -> SolverStats {
        SolverStats {
            solves: self.solves.stats(),
            belief_updates: self.beliefs.stats(),
            tensor_updates: self.tensors.stats(),
        }
    }

    pub fn clear(&self) {
        self.solves.clear();
        self.beliefs.clear();
        self.tensors.clear();
    }

    /// Mixed strategy of `player` at `state` and its value under every hidden
    /// state. `hidden` is the player's own true assignment and only matters at
    /// level 0.
    pub fn solve(
        &self,
        state: &G::State,
        player: PlayerId,
        hidden: HiddenId,
        belief: Option<&Belief>,
        tensor: &KBeliefTensor,
    ) -> Result<Arc<GameMoveSet<G>>, SolverError> {
        self.solve_at(state, player, hidden, belief, tensor, self.config.horizon)
    }

    fn solve_at(
        &self,
        state: &G::State,
        player: PlayerId,
        hidden: HiddenId,
        belief: Option<&Belief>,
        tensor: &KBeliefTensor,
        remaining: Option<u32>,
    ) -> Result<Arc<GameMoveSet<G>>, SolverError> {
        if self.game.is_terminal(state) {
            return Ok(Arc::new(MoveSet::terminal(self.hidden_count())));
        }
        self.check_player(player)?;
        let Some(belief) = belief else {
            let key = SolveKey {
                state: state.clone(),
                player,
                hidden: Some(hidden),
                belief: None,
                tensor: self.empty_tensor(),
                remaining: None,
            };
            return self.solves.get_or_try_insert_with(key, || {
                self.solve_level_zero(state, player, hidden).map(Arc::new)
            });
        };
        self.check_belief(belief, "solve")?;
        self.check_tensor(tensor)?;
        let key = SolveKey {
            state: state.clone(),
            player,
            hidden: None,
            belief: Some(belief.clone()),
            tensor: tensor.clone(),
            remaining,
        };
        self.solves.get_or_try_insert_with(key, || {
            self.solve_recursive(state, player, belief, tensor, remaining)
                .map(Arc::new)
        })
    }

    fn solve_level_zero(
        &self,
        state: &G::State,
        player: PlayerId,
        hidden: HiddenId,
    ) -> Result<GameMoveSet<G>, SolverError> {
        let policy = self.game.base_policy(player, state, hidden);
        if policy.is_empty() {
            return Err(SolverError::NoFeasibleMove {
                player,
                state: format!("{state:?}"),
            });
        }
        let legal = self.game.legal_moves(player, state, hidden);
        let mut total = 0.0;
        for (action, probability) in &policy {
            if !probability.is_finite() || *probability < 0.0 {
                return Err(SolverError::invariant(
                    "base policy",
                    format!("{action:?} has probability {probability}"),
                ));
            }
            if !legal.contains(action) {
                return Err(SolverError::invariant(
                    "base policy",
                    format!("{action:?} is not legal for player {player} at {state:?}"),
                ));
            }
            total += probability;
        }
        if (total - 1.0).abs() > BELIEF_TOLERANCE {
            return Err(SolverError::invariant(
                "base policy",
                format!("probabilities for player {player} sum to {total}"),
            ));
        }
        Ok(MoveSet::from_policy(policy, self.hidden_count()))
    }

    fn solve_recursive(
        &self,
        state: &G::State,
        player: PlayerId,
        belief: &Belief,
        tensor: &KBeliefTensor,
        remaining: Option<u32>,
    ) -> Result<GameMoveSet<G>, SolverError> {
        let hidden_count = self.hidden_count();
        let support: Vec<HiddenId> = belief.support().collect();
        let own_moves = self.feasible_moves(player, state, &support);
        if own_moves.is_empty() {
            return Err(SolverError::NoFeasibleMove {
                player,
                state: format!("{state:?}"),
            });
        }

        let tail = tensor.tail();
        let next_remaining = remaining.map(|steps| steps.saturating_sub(1));
        // move_values[i][h]: value of own move i when h is the true assignment.
        let mut move_values = vec![vec![0.0; hidden_count]; own_moves.len()];
        for &h in &support {
            let models = self.model_movesets(state, h, tensor, &tail, remaining, Some(player))?;
            let others: Vec<Vec<(G::Move, f64)>> = models
                .iter()
                .flatten()
                .map(|model| {
                    model
                        .entries()
                        .iter()
                        .filter(|entry| entry.probability > 0.0)
                        .map(|entry| (entry.action.clone(), entry.probability))
                        .collect()
                })
                .collect();
            let combos = cartesian(&others);
            for (idx, own) in own_moves.iter().enumerate() {
                let mut total = 0.0;
                for combo in &combos {
                    let probability: f64 = combo.iter().map(|(_, p)| p).product();
                    let joint = assemble_joint(combo, player, own);
                    let value = self.step_value(
                        state,
                        player,
                        h,
                        &joint,
                        belief,
                        tensor,
                        remaining,
                        next_remaining,
                    )?;
                    total += probability * value;
                }
                self.check_value(total, "move value")?;
                move_values[idx][h] = total;
            }
        }

        let expected: Vec<f64> = move_values
            .iter()
            .map(|per_hidden| support.iter().map(|&h| belief.prob(h) * per_hidden[h]).sum())
            .collect();
        let mut probabilities = softmax(&expected, self.config.beta);
        tremble(&mut probabilities, self.config.tremble);
        let mass: f64 = probabilities.iter().sum();
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0)
            || (mass - 1.0).abs() > BELIEF_TOLERANCE
        {
            return Err(SolverError::invariant(
                "policy",
                format!("probabilities {probabilities:?} for player {player}"),
            ));
        }

        let mut values = vec![0.0; hidden_count];
        for &h in &support {
            values[h] = probabilities
                .iter()
                .zip(&move_values)
                .map(|(p, per_hidden)| p * per_hidden[h])
                .sum();
            self.check_value(values[h], "strategy value")?;
        }

        let entries: Vec<_> = own_moves
            .into_iter()
            .zip(probabilities)
            .zip(move_values)
            .map(|((action, probability), values)| MoveEntry {
                action,
                probability,
                values,
            })
            .collect();
        let solved = MoveSet::new(entries, values);
        log_solve(state, player, tensor.depth() + 1, support.len(), &solved);
        Ok(solved)
    }

    /// Immediate reward plus discounted continuation for one joint move.
    #[allow(clippy::too_many_arguments)]
    fn step_value(
        &self,
        state: &G::State,
        player: PlayerId,
        hidden: HiddenId,
        joint: &[G::Move],
        belief: &Belief,
        tensor: &KBeliefTensor,
        remaining: Option<u32>,
        next_remaining: Option<u32>,
    ) -> Result<f64, SolverError> {
        let players = self.game.player_count();
        let rewards = self.game.reward(state, hidden, joint);
        if rewards.len() != players {
            return Err(SolverError::ShapeMismatch {
                expected: players,
                actual: rewards.len(),
            });
        }
        let reward = rewards[player];
        let next = self.game.transition(state, hidden, joint);
        if self.game.is_terminal(&next) {
            return Ok(reward);
        }

        let evidence = Evidence::Public(self.game.observation(state, hidden, joint));
        let perspective = Perspective::acting(player, joint[player].clone());
        let next_belief =
            self.update_belief_at(belief, &perspective, state, &evidence, tensor, remaining)?;
        let continuation = if next_remaining == Some(0) {
            self.leaf_value(&next, player, hidden, &next_belief)?
        } else {
            // Ruled-out entries along a hypothetical line are only logged.
            let next_tensor = self.update_k_tensor_at(tensor, state, &evidence, remaining)?;
            self.solve_at(
                &next,
                player,
                hidden,
                Some(&next_belief),
                &next_tensor.tensor,
                next_remaining,
            )?
            .value(hidden)
        };
        Ok(reward + self.config.discount * continuation)
    }

    fn leaf_value(
        &self,
        state: &G::State,
        player: PlayerId,
        hidden: HiddenId,
        belief: &Belief,
    ) -> Result<f64, SolverError> {
        let Some(leaf) = self.leaf.as_ref() else {
            return Err(SolverError::MissingLeafEvaluator {
                state: format!("{state:?}"),
            });
        };
        let values = leaf.evaluate(state, player, belief);
        if values.len() != self.hidden_count() {
            return Err(SolverError::ShapeMismatch {
                expected: self.hidden_count(),
                actual: values.len(),
            });
        }
        let value = values[hidden];
        self.check_value(value, "leaf evaluator")?;
        Ok(value)
    }

    /// Moves legal for `player` under every hypothesis in `support`, in the
    /// order the first hypothesis lists them.
    fn feasible_moves(&self, player: PlayerId, state: &G::State, support: &[HiddenId]) -> Vec<G::Move> {
        let Some((&first, rest)) = support.split_first() else {
            return Vec::new();
        };
        let mut moves = self.game.legal_moves(player, state, first);
        for &h in rest {
            let legal = self.game.legal_moves(player, state, h);
            moves.retain(|action| legal.contains(action));
        }
        moves
    }

    /// Strategy of every player (except `skip`) under hypothesis `hidden`, as
    /// modeled by the owner of `tensor`.
    fn model_movesets(
        &self,
        state: &G::State,
        hidden: HiddenId,
        tensor: &KBeliefTensor,
        tail: &KBeliefTensor,
        remaining: Option<u32>,
        skip: Option<PlayerId>,
    ) -> Result<Vec<Option<Arc<GameMoveSet<G>>>>, SolverError> {
        (0..self.game.player_count())
            .map(|q| {
                if skip == Some(q) {
                    return Ok(None);
                }
                let modeled = (!tensor.is_empty()).then(|| tensor.belief(0, hidden, q));
                self.solve_at(state, q, hidden, modeled.as_ref(), tail, remaining)
                    .map(Some)
            })
            .collect()
    }

    fn check_player(&self, player: PlayerId) -> Result<(), SolverError> {
        if player >= self.game.player_count() {
            return Err(SolverError::ShapeMismatch {
                expected: self.game.player_count(),
                actual: player + 1,
            });
        }
        Ok(())
    }

    fn check_belief(&self, belief: &Belief, context: &'static str) -> Result<(), SolverError> {
        if belief.len() != self.hidden_count() {
            return Err(SolverError::ShapeMismatch {
                expected: self.hidden_count(),
                actual: belief.len(),
            });
        }
        if !belief.is_valid() {
            return Err(SolverError::invariant(context, format!("belief {belief} is not a distribution")));
        }
        Ok(())
    }

    fn check_tensor(&self, tensor: &KBeliefTensor) -> Result<(), SolverError> {
        if tensor.hidden_count() != self.hidden_count() {
            return Err(SolverError::ShapeMismatch {
                expected: self.hidden_count(),
                actual: tensor.hidden_count(),
            });
        }
        if tensor.player_count() != self.game.player_count() {
            return Err(SolverError::ShapeMismatch {
                expected: self.game.player_count(),
                actual: tensor.player_count(),
            });
        }
        Ok(())
    }

    fn check_value(&self, value: f64, context: &'static str) -> Result<(), SolverError> {
        if !value.is_finite() || value.abs() > self.config.value_bound {
            return Err(SolverError::invariant(
                context,
                format!("value {value} outside ±{}", self.config.value_bound),
            ));
        }
        Ok(())
    }
}

fn assemble_joint<M: Clone>(others: &[(M, f64)], player: PlayerId, own: &M) -> Vec<M> {
    let mut joint = Vec::with_capacity(others.len() + 1);
    joint.extend(others[..player].iter().map(|(action, _)| action.clone()));
    joint.push(own.clone());
    joint.extend(others[player..].iter().map(|(action, _)| action.clone()));
    joint
}

fn log_solve<S: std::fmt::Debug, M: Clone + PartialEq + std::fmt::Debug>(
    state: &S,
    player: PlayerId,
    level: usize,
    support: usize,
    solved: &MoveSet<M>,
) {
    if !tracing::enabled!(target: "avalon_bot::solve", Level::DEBUG) {
        return;
    }
    let best = solved
        .best()
        .map(|entry| format!("{:?}@{:.3}", entry.action, entry.probability))
        .unwrap_or_default();
    event!(
        target: "avalon_bot::solve",
        Level::DEBUG,
        player,
        level,
        support,
        moves = solved.len(),
        state = ?state,
        best = %best,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use avalon_core::proposal::{ProposalGame, ProposalMove, ProposalRules, ProposalState, Team};

    fn solver(config: SolverConfig) -> Solver<ProposalGame> {
        Solver::new(ProposalGame::new(ProposalRules::default()), config).unwrap()
    }

    fn mission_state(members: &[usize]) -> ProposalState {
        ProposalState::default().with_proposal(Team::from_members(members).unwrap())
    }

    #[test]
    fn level_follows_belief_and_tensor() {
        let tensor = KBeliefTensor::empty(3, 3);
        assert_eq!(Solver::<ProposalGame>::level(None, &tensor), 0);
        assert_eq!(Solver::<ProposalGame>::level(Some(&Belief::uniform(3)), &tensor), 1);
    }

    #[test]
    fn terminal_state_has_empty_strategy() {
        let solver = solver(SolverConfig::default());
        let done = ProposalState {
            round: 4,
            ..ProposalState::default()
        };
        let set = solver
            .solve(&done, 0, 0, Some(&Belief::uniform(3)), &solver.empty_tensor())
            .unwrap();
        assert!(set.is_empty());
        assert_eq!(set.values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn level_zero_returns_base_policy() {
        let solver = solver(SolverConfig::default());
        let state = mission_state(&[0, 1]);
        let set = solver.solve(&state, 1, 1, None, &solver.empty_tensor()).unwrap();
        assert_eq!(set.probability(&ProposalMove::Fail), 0.995);
        assert!(set.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn adversary_on_final_mission_prefers_failing() {
        let solver = solver(SolverConfig {
            beta: f64::INFINITY,
            ..SolverConfig::default()
        });
        let state = ProposalState {
            round: 2,
            ..mission_state(&[1, 2])
        };
        let belief = solver.game().initial_belief(2, 2);
        let set = solver
            .solve(&state, 2, 2, Some(&belief), &solver.empty_tensor())
            .unwrap();
        assert_eq!(set.probability(&ProposalMove::Fail), 1.0);
        assert_eq!(set.probability(&ProposalMove::Pass), 0.0);
    }

    #[test]
    fn values_outside_support_are_zero() {
        let solver = solver(SolverConfig::default());
        let state = mission_state(&[0, 1]);
        let belief = solver.game().initial_belief(0, 1);
        let set = solver
            .solve(&state, 0, 1, Some(&belief), &solver.empty_tensor())
            .unwrap();
        assert_eq!(set.value(0), 0.0);
        assert!((set.total_probability() - 1.0).abs() < 1e-9);
        for entry in set.entries() {
            assert_eq!(entry.values[0], 0.0);
        }
    }

    #[test]
    fn tremble_keeps_every_move_alive() {
        let solver = solver(SolverConfig {
            beta: f64::INFINITY,
            tremble: 0.1,
            ..SolverConfig::default()
        });
        let state = ProposalState {
            round: 2,
            ..mission_state(&[1, 2])
        };
        let belief = solver.game().initial_belief(2, 2);
        let set = solver
            .solve(&state, 2, 2, Some(&belief), &solver.empty_tensor())
            .unwrap();
        assert!((set.probability(&ProposalMove::Pass) - 0.05).abs() < 1e-12);
        assert!((set.probability(&ProposalMove::Fail) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let solver = solver(SolverConfig::default());
        let state = solver.game().initial_state();
        let err = solver
            .solve(&state, 0, 0, Some(&Belief::uniform(2)), &solver.empty_tensor())
            .unwrap_err();
        assert!(matches!(err, SolverError::ShapeMismatch { expected: 3, actual: 2 }));
        let err = solver
            .solve(&state, 0, 0, Some(&Belief::uniform(3)), &KBeliefTensor::empty(3, 2))
            .unwrap_err();
        assert!(matches!(err, SolverError::ShapeMismatch { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Solver::new(
            ProposalGame::new(ProposalRules::default()),
            SolverConfig {
                tremble: -0.5,
                ..SolverConfig::default()
            },
        );
        assert!(matches!(result, Err(SolverError::Config(_))));
    }

    #[test]
    fn repeated_solves_hit_the_memo() {
        let solver = solver(SolverConfig::default());
        let state = solver.game().initial_state();
        let belief = solver.game().initial_belief(0, 1);
        let first = solver
            .solve(&state, 0, 1, Some(&belief), &solver.empty_tensor())
            .unwrap();
        let before = solver.stats().solves.hits;
        let second = solver
            .solve(&state, 0, 1, Some(&belief), &solver.empty_tensor())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(solver.stats().solves.hits, before + 1);
        solver.clear();
        assert_eq!(solver.stats(), SolverStats::default());
    }

    #[test]
    fn assemble_joint_places_own_move() {
        let others = [('a', 0.5), ('c', 0.5)];
        assert_eq!(assemble_joint(&others, 1, &'b'), vec!['a', 'b', 'c']);
        assert_eq!(assemble_joint(&others, 0, &'x'), vec!['x', 'a', 'c']);
        assert_eq!(assemble_joint(&others, 2, &'z'), vec!['a', 'c', 'z']);
    }
}
