//! Bayesian belief and k-belief tensor updates driven by solver strategies.

use super::{GameEvidence, GamePerspective, Solver};
use crate::error::SolverError;
use avalon_core::belief::{Belief, KBeliefTensor};
use avalon_core::game::{Game, HiddenId, PlayerId};
use tracing::{Level, event};

/// What a step revealed: the full joint move, or only its public observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Evidence<M, O> {
    Joint(Vec<M>),
    Public(O),
}

/// Whose belief is being updated, and their own move when they know it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Perspective<M> {
    pub player: PlayerId,
    pub own_move: Option<M>,
}

impl<M> Perspective<M> {
    /// A player who knows the move they just made.
    pub fn acting(player: PlayerId, own_move: M) -> Self {
        Self {
            player,
            own_move: Some(own_move),
        }
    }

    /// A player whose own move is marginalised like everyone else's.
    pub fn watching(player: PlayerId) -> Self {
        Self {
            player,
            own_move: None,
        }
    }
}

/// A tensor entry whose modeled player could not explain the evidence. The
/// entry holds its pre-observation belief in the advanced tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuledOut {
    pub layer: usize,
    pub hidden: HiddenId,
    pub player: PlayerId,
}

/// Result of advancing a k-belief tensor past one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorUpdate {
    pub tensor: KBeliefTensor,
    /// Entries the evidence contradicted, ordered by layer, then hidden state,
    /// then player.
    pub ruled_out: Vec<RuledOut>,
}

impl TensorUpdate {
    fn unchanged(tensor: &KBeliefTensor) -> Self {
        Self {
            tensor: tensor.clone(),
            ruled_out: Vec::new(),
        }
    }

    /// True when every entry absorbed the evidence.
    pub fn is_consistent(&self) -> bool {
        self.ruled_out.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct BeliefKey<S, M, O> {
    belief: Belief,
    perspective: Perspective<M>,
    state: S,
    evidence: Evidence<M, O>,
    tensor: KBeliefTensor,
    remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct TensorKey<S, M, O> {
    tensor: KBeliefTensor,
    state: S,
    evidence: Evidence<M, O>,
    remaining: Option<u32>,
}

impl<G: Game> Solver<G> {
    /// Posterior of `perspective.player` after `evidence` was revealed at
    /// `state`. `tensor` is the player's model of everyone's beliefs and
    /// supplies the strategies used as likelihoods.
    pub fn update_belief(
        &self,
        belief: &Belief,
        perspective: &GamePerspective<G>,
        state: &G::State,
        evidence: &GameEvidence<G>,
        tensor: &KBeliefTensor,
    ) -> Result<Belief, SolverError> {
        self.update_belief_at(belief, perspective, state, evidence, tensor, self.config.horizon)
    }

    /// Advances every layer of `tensor` past `evidence`. A depth-0 tensor is
    /// returned unchanged. Entries whose modeled player finds the evidence
    /// impossible are listed in [`TensorUpdate::ruled_out`].
    pub fn update_k_tensor(
        &self,
        tensor: &KBeliefTensor,
        state: &G::State,
        evidence: &GameEvidence<G>,
    ) -> Result<TensorUpdate, SolverError> {
        self.update_k_tensor_at(tensor, state, evidence, self.config.horizon)
    }

    /// Probability of `evidence` at `state` when `hidden` is true, as seen by
    /// `perspective.player` modeling the others through `tensor`.
    pub fn likelihood(
        &self,
        state: &G::State,
        hidden: HiddenId,
        perspective: &GamePerspective<G>,
        evidence: &GameEvidence<G>,
        tensor: &KBeliefTensor,
    ) -> Result<f64, SolverError> {
        self.check_player(perspective.player)?;
        self.check_tensor(tensor)?;
        let tail = tensor.tail();
        self.likelihood_at(
            state,
            hidden,
            perspective,
            evidence,
            tensor,
            &tail,
            self.config.horizon,
        )
    }

    pub(super) fn update_belief_at(
        &self,
        belief: &Belief,
        perspective: &GamePerspective<G>,
        state: &G::State,
        evidence: &GameEvidence<G>,
        tensor: &KBeliefTensor,
        remaining: Option<u32>,
    ) -> Result<Belief, SolverError> {
        self.check_player(perspective.player)?;
        self.check_belief(belief, "belief update")?;
        self.check_tensor(tensor)?;
        let key = BeliefKey {
            belief: belief.clone(),
            perspective: perspective.clone(),
            state: state.clone(),
            evidence: evidence.clone(),
            tensor: tensor.clone(),
            remaining,
        };
        self.beliefs.get_or_try_insert_with(key, || {
            self.posterior(belief, perspective, state, evidence, tensor, remaining)
        })
    }

    fn posterior(
        &self,
        belief: &Belief,
        perspective: &GamePerspective<G>,
        state: &G::State,
        evidence: &GameEvidence<G>,
        tensor: &KBeliefTensor,
        remaining: Option<u32>,
    ) -> Result<Belief, SolverError> {
        let tail = tensor.tail();
        let mut weights = vec![0.0; belief.len()];
        for h in belief.support() {
            let likelihood =
                self.likelihood_at(state, h, perspective, evidence, tensor, &tail, remaining)?;
            weights[h] = belief.prob(h) * likelihood;
        }

        let total: f64 = weights.iter().sum();
        if !total.is_finite() {
            return Err(SolverError::invariant(
                "belief update",
                format!("unnormalised posterior {weights:?}"),
            ));
        }
        if total <= 0.0 {
            if tracing::enabled!(target: "avalon_bot::update", Level::DEBUG) {
                event!(
                    target: "avalon_bot::update",
                    Level::DEBUG,
                    player = perspective.player,
                    prior = %belief,
                    evidence = ?evidence,
                    "evidence impossible under every retained hypothesis"
                );
            }
            return Err(SolverError::ImpossibleObservation {
                player: Some(perspective.player),
                evidence: format!("{evidence:?}"),
            });
        }

        let posterior = Belief::from_weights(weights)
            .map_err(|err| SolverError::invariant("belief update", err.to_string()))?;
        check_posterior(belief, &posterior)?;
        Ok(posterior)
    }

    #[allow(clippy::too_many_arguments)]
    fn likelihood_at(
        &self,
        state: &G::State,
        hidden: HiddenId,
        perspective: &GamePerspective<G>,
        evidence: &GameEvidence<G>,
        tensor: &KBeliefTensor,
        tail: &KBeliefTensor,
        remaining: Option<u32>,
    ) -> Result<f64, SolverError> {
        let players = self.game.player_count();
        let joints = match evidence {
            Evidence::Joint(joint) => {
                if joint.len() != players {
                    return Err(SolverError::ShapeMismatch {
                        expected: players,
                        actual: joint.len(),
                    });
                }
                vec![joint.clone()]
            }
            Evidence::Public(observation) => self.game.infer_action_sets(state, observation, hidden),
        };
        let own = perspective.own_move.as_ref();
        let consistent: Vec<&Vec<G::Move>> = joints
            .iter()
            .filter(|joint| own.is_none_or(|own| joint.get(perspective.player) == Some(own)))
            .collect();
        if consistent.is_empty() {
            return Ok(0.0);
        }

        let skip = own.map(|_| perspective.player);
        let models = self.model_movesets(state, hidden, tensor, tail, remaining, skip)?;
        let mut total = 0.0;
        for joint in consistent {
            let mut probability = 1.0;
            for (model, action) in models.iter().zip(joint.iter()) {
                if let Some(model) = model {
                    probability *= model.probability(action);
                }
                if probability == 0.0 {
                    break;
                }
            }
            total += probability;
        }
        Ok(total)
    }

    pub(super) fn update_k_tensor_at(
        &self,
        tensor: &KBeliefTensor,
        state: &G::State,
        evidence: &GameEvidence<G>,
        remaining: Option<u32>,
    ) -> Result<TensorUpdate, SolverError> {
        if tensor.is_empty() {
            return Ok(TensorUpdate::unchanged(tensor));
        }
        self.check_tensor(tensor)?;
        let key = TensorKey {
            tensor: tensor.clone(),
            state: state.clone(),
            evidence: evidence.clone(),
            remaining,
        };
        self.tensors.get_or_try_insert_with(key, || {
            self.advance_tensor(tensor, state, evidence, remaining)
        })
    }

    // The tail is advanced first; layer-0 entries are then updated against the
    // pre-observation tail, the beliefs the modeled players held when they moved.
    fn advance_tensor(
        &self,
        tensor: &KBeliefTensor,
        state: &G::State,
        evidence: &GameEvidence<G>,
        remaining: Option<u32>,
    ) -> Result<TensorUpdate, SolverError> {
        let tail = tensor.tail();
        let next_tail = self.update_k_tensor_at(&tail, state, evidence, remaining)?;
        let players = tensor.player_count();
        let mut top = Vec::with_capacity(tensor.hidden_count() * players);
        let mut ruled_out = Vec::new();
        for h in 0..tensor.hidden_count() {
            for p in 0..players {
                let prior = tensor.belief(0, h, p);
                let perspective = match evidence {
                    Evidence::Joint(joint) => Perspective {
                        player: p,
                        own_move: joint.get(p).cloned(),
                    },
                    Evidence::Public(_) => Perspective::watching(p),
                };
                let posterior = match self.update_belief_at(
                    &prior,
                    &perspective,
                    state,
                    evidence,
                    &tail,
                    remaining,
                ) {
                    Ok(posterior) => posterior,
                    Err(SolverError::ImpossibleObservation { .. }) => {
                        log_ruled_out(h, p, &prior);
                        ruled_out.push(RuledOut {
                            layer: 0,
                            hidden: h,
                            player: p,
                        });
                        prior
                    }
                    Err(err) => return Err(err),
                };
                top.push(posterior);
            }
        }
        ruled_out.extend(next_tail.ruled_out.into_iter().map(|entry| RuledOut {
            layer: entry.layer + 1,
            ..entry
        }));
        Ok(TensorUpdate {
            tensor: KBeliefTensor::stack(&top, &next_tail.tensor),
            ruled_out,
        })
    }
}

fn check_posterior(prior: &Belief, posterior: &Belief) -> Result<(), SolverError> {
    if !posterior.is_valid() {
        return Err(SolverError::invariant(
            "belief update",
            format!("posterior {posterior} does not sum to one"),
        ));
    }
    for (h, (&before, &after)) in prior.probs().iter().zip(posterior.probs()).enumerate() {
        if before == 0.0 && after != 0.0 {
            return Err(SolverError::invariant(
                "belief update",
                format!("hidden state {h} regained mass ({after})"),
            ));
        }
    }
    Ok(())
}

fn log_ruled_out(hidden: HiddenId, player: PlayerId, prior: &Belief) {
    if !tracing::enabled!(target: "avalon_bot::update", Level::DEBUG) {
        return;
    }
    event!(
        target: "avalon_bot::update",
        Level::DEBUG,
        hidden,
        player,
        prior = %prior,
        "modeled player cannot explain evidence"
    );
}
