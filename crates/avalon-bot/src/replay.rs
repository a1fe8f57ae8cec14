//! Recomputing a player's belief over a recorded sequence of steps, either
//! step by step through an [`Agent`] or in one pass over hidden-state particles.

use crate::agent::Agent;
use crate::error::SolverError;
use crate::solver::{Evidence, GameEvidence, Perspective, RuledOut, Solver};
use avalon_core::belief::{Belief, KBeliefTensor};
use avalon_core::game::{Game, PlayerId};

/// One recorded step as seen by the replaying player.
pub struct ReplayStep<G: Game> {
    pub state: G::State,
    pub own_move: Option<G::Move>,
    pub evidence: GameEvidence<G>,
}

impl<G: Game> ReplayStep<G> {
    /// Step known only through its public observation.
    pub fn public(state: G::State, observation: G::Observation) -> Self {
        Self {
            state,
            own_move: None,
            evidence: Evidence::Public(observation),
        }
    }

    /// Step where the replaying player knows what they played.
    pub fn acting(state: G::State, own_move: G::Move, observation: G::Observation) -> Self {
        Self {
            state,
            own_move: Some(own_move),
            evidence: Evidence::Public(observation),
        }
    }
}

/// Converts a public `(state, observation)` history into replay steps.
pub fn steps_from_history<G: Game>(history: Vec<(G::State, G::Observation)>) -> Vec<ReplayStep<G>> {
    history
        .into_iter()
        .map(|(state, observation)| ReplayStep::public(state, observation))
        .collect()
}

/// Final state of a sequential replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    /// `None` for a level-0 agent.
    pub belief: Option<Belief>,
    /// Tensor entries ruled out along the way, tagged with the step index.
    pub ruled_out: Vec<(usize, RuledOut)>,
}

/// Feeds every step to `agent` in order.
pub fn replay_sequential<G: Game>(
    agent: &mut Agent<'_, G>,
    steps: &[ReplayStep<G>],
) -> Result<ReplayOutcome, SolverError> {
    let mut ruled_out = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let entries = agent.observe(&step.state, step.own_move.clone(), &step.evidence)?;
        ruled_out.extend(entries.into_iter().map(|entry| (index, entry)));
    }
    Ok(ReplayOutcome {
        belief: agent.belief().cloned(),
        ruled_out,
    })
}

/// Posterior of `player` computed from scratch: each hidden state in the prior
/// is a particle whose log-weight accumulates the per-step likelihoods, and the
/// weights are normalised once at the end. The tensor advances exactly as in
/// [`replay_sequential`], which reports any entries it rules out.
pub fn particle_posterior<G: Game>(
    solver: &Solver<G>,
    player: PlayerId,
    prior: &Belief,
    tensor: &KBeliefTensor,
    steps: &[ReplayStep<G>],
) -> Result<Belief, SolverError> {
    // The tensor evolves independently of the owner's belief.
    let mut tensors = Vec::with_capacity(steps.len());
    let mut current = tensor.clone();
    for step in steps {
        let next = solver
            .update_k_tensor(&current, &step.state, &step.evidence)?
            .tensor;
        tensors.push(std::mem::replace(&mut current, next));
    }

    let mut log_weights = vec![f64::NEG_INFINITY; prior.len()];
    for h in prior.support() {
        let mut log_weight = prior.prob(h).ln();
        for (step, tensor) in steps.iter().zip(&tensors) {
            let perspective = Perspective {
                player,
                own_move: step.own_move.clone(),
            };
            let likelihood = solver.likelihood(&step.state, h, &perspective, &step.evidence, tensor)?;
            if likelihood <= 0.0 {
                log_weight = f64::NEG_INFINITY;
                break;
            }
            log_weight += likelihood.ln();
        }
        log_weights[h] = log_weight;
    }

    let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Err(SolverError::ImpossibleObservation {
            player: Some(player),
            evidence: format!("{} replayed steps", steps.len()),
        });
    }
    let weights = log_weights.into_iter().map(|lw| (lw - max).exp()).collect();
    Belief::from_weights(weights).map_err(SolverError::from)
}
