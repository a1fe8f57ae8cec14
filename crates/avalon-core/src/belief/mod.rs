//! Beliefs over hidden role assignments.
//!
//! - `vector`: a single player's distribution over hidden states (`Belief`).
//! - `tensor`: the owner's nested model of everyone else's beliefs (`KBeliefTensor`).

mod tensor;
mod vector;

pub use tensor::KBeliefTensor;
pub use vector::{BELIEF_TOLERANCE, Belief, BeliefError};
