//! Three-round team-proposal game with a single concealed adversary.

mod record;
mod rules;
mod state;
mod team;

pub use record::{MissionRecord, ProposalError, ProposalRecord};
pub use rules::{ProposalGame, ProposalRules};
pub use state::{Assignment, ProposalMove, ProposalObservation, ProposalState};
pub use team::Team;
