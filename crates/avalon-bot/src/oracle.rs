//! Value estimates for states where search stops before the game ends.

use avalon_core::belief::Belief;
use avalon_core::game::{Game, PlayerId};

/// Opaque per-hidden-state value estimate used once the search horizon runs
/// out. Implementations may be approximate; the solver only checks the shape
/// and finiteness of what comes back.
pub trait LeafEvaluator<G: Game>: Send + Sync {
    /// Value of `state` to `player` under each hidden state, given the belief
    /// the player holds on arrival.
    fn evaluate(&self, state: &G::State, player: PlayerId, belief: &Belief) -> Vec<f64>;
}

impl<G, F> LeafEvaluator<G> for F
where
    G: Game,
    F: Fn(&G::State, PlayerId, &Belief) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, state: &G::State, player: PlayerId, belief: &Belief) -> Vec<f64> {
        self(state, player, belief)
    }
}

/// Evaluator that scores every cutoff state as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroEvaluator;

impl<G: Game> LeafEvaluator<G> for ZeroEvaluator {
    fn evaluate(&self, _state: &G::State, _player: PlayerId, belief: &Belief) -> Vec<f64> {
        vec![0.0; belief.len()]
    }
}
