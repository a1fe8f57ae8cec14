//! Nested "what I think you think" beliefs stored as a fixed-shape array.

use super::{Belief, BeliefError};
use crate::game::{Game, HiddenId, PlayerId};
use std::hash::{Hash, Hasher};

/// Owner's recursive model of every player's belief.
///
/// Shape is `depth × hidden × player × hidden`. Layer 0 holds, for each hidden
/// hypothesis and player, the belief the owner attributes to that player. Layer
/// 1 holds what those modeled players are taken to attribute to others, and so
/// on. A depth-0 tensor is the empty model carried by agents at level 0 or 1.
#[derive(Debug, Clone)]
pub struct KBeliefTensor {
    depth: usize,
    hidden: usize,
    players: usize,
    data: Vec<f64>,
}

impl KBeliefTensor {
    /// Tensor with no layers.
    pub fn empty(hidden: usize, players: usize) -> Self {
        Self {
            depth: 0,
            hidden,
            players,
            data: Vec::new(),
        }
    }

    /// Builds a tensor by asking `init` for each `(layer, hidden, player)` entry.
    pub fn from_fn<F>(
        depth: usize,
        hidden: usize,
        players: usize,
        mut init: F,
    ) -> Result<Self, BeliefError>
    where
        F: FnMut(usize, HiddenId, PlayerId) -> Belief,
    {
        let mut data = Vec::with_capacity(depth * hidden * players * hidden);
        for layer in 0..depth {
            for h in 0..hidden {
                for p in 0..players {
                    let belief = init(layer, h, p);
                    if belief.len() != hidden {
                        return Err(BeliefError::LengthMismatch {
                            expected: hidden,
                            actual: belief.len(),
                        });
                    }
                    data.extend_from_slice(belief.probs());
                }
            }
        }
        Ok(Self {
            depth,
            hidden,
            players,
            data,
        })
    }

    /// Every layer seeded with the game's starting beliefs.
    pub fn initial<G: Game>(game: &G, depth: usize) -> Self {
        let hidden = game.hidden_states().len();
        let players = game.player_count();
        let mut data = Vec::with_capacity(depth * hidden * players * hidden);
        for _ in 0..depth {
            for h in 0..hidden {
                for p in 0..players {
                    let belief = game.initial_belief(p, h);
                    debug_assert_eq!(belief.len(), hidden);
                    data.extend_from_slice(belief.probs());
                }
            }
        }
        Self {
            depth,
            hidden,
            players,
            data,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden
    }

    pub fn player_count(&self) -> usize {
        self.players
    }

    /// Raw probabilities for one entry.
    pub fn slice(&self, layer: usize, hidden: HiddenId, player: PlayerId) -> &[f64] {
        let start = self.offset(layer, hidden, player);
        &self.data[start..start + self.hidden]
    }

    /// Belief attributed to `player` at `layer` when `hidden` is true.
    pub fn belief(&self, layer: usize, hidden: HiddenId, player: PlayerId) -> Belief {
        Belief::from_raw(self.slice(layer, hidden, player).to_vec())
    }

    /// Overwrites one entry.
    pub fn set(
        &mut self,
        layer: usize,
        hidden: HiddenId,
        player: PlayerId,
        belief: &Belief,
    ) -> Result<(), BeliefError> {
        if belief.len() != self.hidden {
            return Err(BeliefError::LengthMismatch {
                expected: self.hidden,
                actual: belief.len(),
            });
        }
        let start = self.offset(layer, hidden, player);
        self.data[start..start + self.hidden].copy_from_slice(belief.probs());
        Ok(())
    }

    /// The model a layer-0 player carries: every layer but the first.
    pub fn tail(&self) -> Self {
        if self.depth == 0 {
            return self.clone();
        }
        let stride = self.layer_stride();
        Self {
            depth: self.depth - 1,
            hidden: self.hidden,
            players: self.players,
            data: self.data[stride..].to_vec(),
        }
    }

    /// Places a new first layer on top of `tail`. `top` is indexed
    /// `hidden * players + player`.
    pub fn stack(top: &[Belief], tail: &KBeliefTensor) -> Self {
        debug_assert_eq!(top.len(), tail.hidden * tail.players);
        let mut data = Vec::with_capacity(tail.layer_stride() * (tail.depth + 1));
        for belief in top {
            data.extend_from_slice(belief.probs());
        }
        data.extend_from_slice(&tail.data);
        Self {
            depth: tail.depth + 1,
            hidden: tail.hidden,
            players: tail.players,
            data,
        }
    }

    /// True when every entry is a valid belief.
    pub fn is_valid(&self) -> bool {
        (0..self.depth).all(|layer| {
            (0..self.hidden).all(|h| {
                (0..self.players).all(|p| {
                    let slice = self.slice(layer, h, p);
                    let sum: f64 = slice.iter().sum();
                    slice.iter().all(|v| v.is_finite() && *v >= 0.0)
                        && (sum - 1.0).abs() <= super::BELIEF_TOLERANCE
                })
            })
        })
    }

    fn layer_stride(&self) -> usize {
        self.hidden * self.players * self.hidden
    }

    fn offset(&self, layer: usize, hidden: HiddenId, player: PlayerId) -> usize {
        assert!(layer < self.depth, "layer {layer} out of depth {}", self.depth);
        assert!(hidden < self.hidden && player < self.players);
        layer * self.layer_stride() + (hidden * self.players + player) * self.hidden
    }
}

impl PartialEq for KBeliefTensor {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.hidden == other.hidden
            && self.players == other.players
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for KBeliefTensor {}

impl Hash for KBeliefTensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth.hash(state);
        self.hidden.hash(state);
        self.players.hash(state);
        for value in &self.data {
            value.to_bits().hash(state);
        }
    }
}
