pub mod agent;
pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod oracle;
pub mod replay;
pub mod solver;

pub use agent::Agent;
pub use config::{
    ConfigError, LoadError, LoggingConfig, RunConfig, SolverConfig, ValidationError,
};
pub use error::SolverError;
pub use observer::{ObservationReport, Observer};
pub use oracle::{LeafEvaluator, ZeroEvaluator};
pub use replay::{
    ReplayOutcome, ReplayStep, particle_posterior, replay_sequential, steps_from_history,
};
pub use solver::{
    Evidence, MoveEntry, MoveSet, Perspective, RuledOut, Solver, SolverStats, TensorUpdate,
};
