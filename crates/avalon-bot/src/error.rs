use crate::config::ValidationError;
use avalon_core::belief::BeliefError;
use avalon_core::game::PlayerId;
use thiserror::Error;

/// Failures surfaced by [`crate::solver::Solver`] and the agents built on it.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invariant violated in {context}: {detail}")]
    InvariantViolation {
        context: &'static str,
        detail: String,
    },
    #[error("player {player} has no move legal under every retained hypothesis at {state}")]
    NoFeasibleMove { player: PlayerId, state: String },
    #[error("evidence {evidence} rules out every hypothesis held by {}", seat_label(.player))]
    ImpossibleObservation {
        player: Option<PlayerId>,
        evidence: String,
    },
    #[error("horizon exhausted at {state} but no leaf evaluator is configured")]
    MissingLeafEvaluator { state: String },
    #[error("expected {expected} entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Belief(#[from] BeliefError),
    #[error("invalid solver configuration: {0}")]
    Config(#[from] ValidationError),
}

impl SolverError {
    pub(crate) fn invariant(context: &'static str, detail: impl Into<String>) -> Self {
        SolverError::InvariantViolation {
            context,
            detail: detail.into(),
        }
    }
}

fn seat_label(player: &Option<PlayerId>) -> String {
    match player {
        Some(player) => format!("player {player}"),
        None => "the observer".to_string(),
    }
}
