//! Roleless spectator that infers the hidden assignment from public play.

use crate::agent::Agent;
use crate::error::SolverError;
use crate::solver::{Evidence, RuledOut, Solver};
use avalon_core::belief::Belief;
use avalon_core::game::{Game, HiddenId, PlayerId};
use tracing::{Level, event};

/// What one observation did to the observer's models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationReport {
    /// Models `(hidden, player)` whose own belief could not absorb the
    /// evidence. They keep their previous belief and tensor.
    pub stale_models: Vec<(HiddenId, PlayerId)>,
    /// Tensor entries ruled out inside the models that did advance.
    pub ruled_out: Vec<(HiddenId, PlayerId, RuledOut)>,
}

impl ObservationReport {
    pub fn is_consistent(&self) -> bool {
        self.stale_models.is_empty() && self.ruled_out.is_empty()
    }
}

/// Tracks a belief over hidden states by asking, for each hypothesis, how
/// likely modeled players at fixed levels were to produce what was seen.
pub struct Observer<'s, G: Game> {
    solver: &'s Solver<G>,
    belief: Belief,
    // models[h][p]: player p as they would be if h were the true assignment.
    models: Vec<Vec<Agent<'s, G>>>,
}

impl<'s, G: Game> Observer<'s, G> {
    /// `levels[p]` is the reasoning level assumed for player `p`.
    pub fn new(solver: &'s Solver<G>, levels: &[usize]) -> Result<Self, SolverError> {
        let players = solver.game().player_count();
        if levels.len() != players {
            return Err(SolverError::ShapeMismatch {
                expected: players,
                actual: levels.len(),
            });
        }
        let hidden_count = solver.hidden_count();
        let models = (0..hidden_count)
            .map(|h| {
                levels
                    .iter()
                    .enumerate()
                    .map(|(p, &level)| Agent::new(solver, p, h, level))
                    .collect()
            })
            .collect();
        Ok(Self {
            solver,
            belief: Belief::uniform(hidden_count),
            models,
        })
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    /// Most likely hidden state; the lowest index wins ties.
    pub fn predict(&self) -> Option<HiddenId> {
        self.belief.argmax()
    }

    pub fn model(&self, hidden: HiddenId, player: PlayerId) -> Option<&Agent<'s, G>> {
        self.models.get(hidden).and_then(|row| row.get(player))
    }

    /// Reweights hypotheses by the probability the models assign to
    /// `observation` at `state`, then advances the surviving models. The new
    /// belief is available through [`Observer::belief`].
    pub fn observe(
        &mut self,
        state: &G::State,
        observation: &G::Observation,
    ) -> Result<ObservationReport, SolverError> {
        let game = self.solver.game();
        let mut weights = vec![0.0; self.belief.len()];
        let mut consistent = vec![Vec::new(); self.belief.len()];
        for h in self.belief.support() {
            let joints = game.infer_action_sets(state, observation, h);
            let strategies = self.models[h]
                .iter()
                .map(|model| model.strategy(state))
                .collect::<Result<Vec<_>, _>>()?;
            let likelihood: f64 = joints
                .iter()
                .map(|joint| {
                    strategies
                        .iter()
                        .zip(joint)
                        .map(|(strategy, action)| strategy.probability(action))
                        .product::<f64>()
                })
                .sum();
            weights[h] = self.belief.prob(h) * likelihood;
            consistent[h] = joints;
        }

        let total: f64 = weights.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(SolverError::ImpossibleObservation {
                player: None,
                evidence: format!("{observation:?}"),
            });
        }
        let posterior = Belief::from_weights(weights)
            .map_err(|err| SolverError::invariant("observer update", err.to_string()))?;

        let mut report = ObservationReport::default();
        for h in posterior.support() {
            let joints = &consistent[h];
            let evidence = match joints.as_slice() {
                [joint] => Evidence::Joint(joint.clone()),
                _ => Evidence::Public(observation.clone()),
            };
            for (p, model) in self.models[h].iter_mut().enumerate() {
                let own_move = shared_move(joints, p);
                match model.observe(state, own_move, &evidence) {
                    Ok(ruled_out) => report
                        .ruled_out
                        .extend(ruled_out.into_iter().map(|entry| (h, p, entry))),
                    Err(SolverError::ImpossibleObservation { .. }) => {
                        log_stale_model(h, p);
                        report.stale_models.push((h, p));
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        self.belief = posterior;
        Ok(report)
    }
}

/// The move `player` made in every consistent joint, if they all agree.
fn shared_move<M: Clone + PartialEq>(joints: &[Vec<M>], player: PlayerId) -> Option<M> {
    let (first, rest) = joints.split_first()?;
    let candidate = first.get(player)?;
    rest.iter()
        .all(|joint| joint.get(player) == Some(candidate))
        .then(|| candidate.clone())
}

fn log_stale_model(hidden: HiddenId, player: PlayerId) {
    if !tracing::enabled!(target: "avalon_bot::update", Level::DEBUG) {
        return;
    }
    event!(
        target: "avalon_bot::update",
        Level::DEBUG,
        hidden,
        player,
        "observer model cannot explain evidence"
    );
}
