//! Abstract contract a hidden-role game exposes to the solver.

use crate::belief::Belief;
use std::fmt::Debug;
use std::hash::Hash;

/// Seat index, `0..player_count()`.
pub type PlayerId = usize;

/// Index into [`Game::hidden_states`].
pub type HiddenId = usize;

/// Rules of a finite, simultaneous-move game with a concealed role assignment.
///
/// Every player submits one move per step (players without a real choice submit
/// a no-op), so a joint move always has `player_count()` entries. The next public
/// state must be determined by the current state and the public observation:
/// two joint moves that produce the same observation also produce the same
/// successor.
pub trait Game {
    type State: Clone + Eq + Hash + Debug;
    type Move: Clone + Eq + Hash + Debug;
    type Observation: Clone + Eq + Hash + Debug;
    type Hidden: Clone + Eq + Debug;

    fn player_count(&self) -> usize;

    /// Every possible hidden assignment; indices are stable.
    fn hidden_states(&self) -> &[Self::Hidden];

    fn initial_state(&self) -> Self::State;

    /// Moves available to `player` when `hidden` is the true assignment, in a
    /// deterministic order.
    fn legal_moves(&self, player: PlayerId, state: &Self::State, hidden: HiddenId)
    -> Vec<Self::Move>;

    fn transition(&self, state: &Self::State, hidden: HiddenId, joint: &[Self::Move])
    -> Self::State;

    fn observation(
        &self,
        state: &Self::State,
        hidden: HiddenId,
        joint: &[Self::Move],
    ) -> Self::Observation;

    /// Immediate payoff for every player.
    fn reward(&self, state: &Self::State, hidden: HiddenId, joint: &[Self::Move]) -> Vec<f64>;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Joint moves legal under `hidden` that would have produced `observation`.
    fn infer_action_sets(
        &self,
        state: &Self::State,
        observation: &Self::Observation,
        hidden: HiddenId,
    ) -> Vec<Vec<Self::Move>> {
        joint_moves(self, state, hidden)
            .into_iter()
            .filter(|joint| &self.observation(state, hidden, joint) == observation)
            .collect()
    }

    /// Starting belief of `player` when `hidden` is the true assignment.
    fn initial_belief(&self, player: PlayerId, hidden: HiddenId) -> Belief;

    /// Level-0 strategy: `(move, probability)` over the legal moves.
    fn base_policy(
        &self,
        player: PlayerId,
        state: &Self::State,
        hidden: HiddenId,
    ) -> Vec<(Self::Move, f64)>;
}

/// Every legal joint move under `hidden`.
pub fn joint_moves<G: Game + ?Sized>(game: &G, state: &G::State, hidden: HiddenId) -> Vec<Vec<G::Move>> {
    let per_player: Vec<Vec<G::Move>> = (0..game.player_count())
        .map(|player| game.legal_moves(player, state, hidden))
        .collect();
    cartesian(&per_player)
}

/// Cartesian product of `lists`, first list varying slowest.
pub fn cartesian<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut combos: Vec<Vec<T>> = vec![Vec::with_capacity(lists.len())];
    for list in lists {
        let mut next = Vec::with_capacity(combos.len() * list.len());
        for prefix in &combos {
            for item in list {
                let mut combo = prefix.clone();
                combo.push(item.clone());
                next.push(combo);
            }
        }
        combos = next;
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{ProposalGame, ProposalMove, ProposalRules};

    #[test]
    fn cartesian_orders_first_list_slowest() {
        let combos = cartesian(&[vec![1, 2], vec![10, 20, 30]]);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0], vec![1, 10]);
        assert_eq!(combos[2], vec![1, 30]);
        assert_eq!(combos[3], vec![2, 10]);
    }

    #[test]
    fn cartesian_with_empty_list_has_no_combos() {
        let combos: Vec<Vec<u8>> = cartesian(&[vec![1], vec![]]);
        assert!(combos.is_empty());
        let unit: Vec<Vec<u8>> = cartesian(&[]);
        assert_eq!(unit, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn joint_moves_cover_every_proposal() {
        let game = ProposalGame::new(ProposalRules::default());
        let state = game.initial_state();
        let joints = joint_moves(&game, &state, 0);
        assert_eq!(joints.len(), 3);
        for joint in &joints {
            assert!(matches!(joint[0], ProposalMove::Propose(_)));
            assert_eq!(joint[1], ProposalMove::Observe);
            assert_eq!(joint[2], ProposalMove::Observe);
        }
    }
}
