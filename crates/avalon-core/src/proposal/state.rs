use super::team::Team;
use crate::game::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concealed role assignment: which player is the adversary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub adversary: PlayerId,
}

/// Public configuration of a proposal game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProposalState {
    pub round: u8,
    pub proposal: Option<Team>,
    pub fails: u8,
    pub succeeds: u8,
}

impl ProposalState {
    /// Seat that proposes during `round`.
    pub fn proposer(&self, players: usize) -> PlayerId {
        self.round as usize % players.max(1)
    }

    pub fn with_proposal(&self, team: Team) -> Self {
        Self {
            proposal: Some(team),
            ..*self
        }
    }

    /// Clears the proposal and records the mission outcome.
    pub fn after_mission(&self, failed: bool) -> Self {
        Self {
            round: self.round + 1,
            proposal: None,
            fails: self.fails + u8::from(failed),
            succeeds: self.succeeds + u8::from(!failed),
        }
    }

    pub fn after_accusation(&self) -> Self {
        Self {
            round: self.round + 1,
            ..*self
        }
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<round={} proposal=", self.round)?;
        match self.proposal {
            Some(team) => write!(f, "{team}")?,
            None => f.write_str("-")?,
        }
        write!(f, " succeeded={} failed={}>", self.succeeds, self.fails)
    }
}

/// Everything a player can submit in a proposal game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProposalMove {
    Propose(Team),
    Pass,
    Fail,
    /// Accuse a player, or abstain with `None`.
    Pick(Option<PlayerId>),
    Observe,
}

impl fmt::Display for ProposalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalMove::Propose(team) => write!(f, "propose {team}"),
            ProposalMove::Pass => f.write_str("pass"),
            ProposalMove::Fail => f.write_str("fail"),
            ProposalMove::Pick(Some(target)) => write!(f, "pick {target}"),
            ProposalMove::Pick(None) => f.write_str("abstain"),
            ProposalMove::Observe => f.write_str("observe"),
        }
    }
}

/// What every player sees after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalObservation {
    Proposed(Team),
    /// Number of fail votes, without who cast them.
    Mission { fails: u8 },
    Concluded,
}
