use super::rules::{ProposalGame, ProposalRules};
use super::state::{ProposalObservation, ProposalState};
use super::team::Team;
use crate::game::Game;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public outcome of one mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionRecord {
    pub team: Team,
    pub fails: u8,
}

/// Everything an outside observer saw of a proposal game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    #[serde(default)]
    pub rules: ProposalRules,
    pub missions: Vec<MissionRecord>,
}

impl ProposalRecord {
    pub fn new(rules: ProposalRules) -> Self {
        Self {
            rules,
            missions: Vec::new(),
        }
    }

    pub fn push(&mut self, team: Team, fails: u8) {
        self.missions.push(MissionRecord { team, fails });
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ProposalError> {
        let record: Self = serde_json::from_str(json).map_err(ProposalError::Json)?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), ProposalError> {
        self.rules.validate()?;
        if self.missions.len() > self.rules.rounds as usize {
            return Err(ProposalError::TooManyMissions {
                rounds: self.rules.rounds,
                missions: self.missions.len(),
            });
        }
        for (index, mission) in self.missions.iter().enumerate() {
            let in_range = mission.team.members().all(|p| p < self.rules.players);
            if mission.team.len() != self.rules.team_size || !in_range {
                return Err(ProposalError::InvalidTeam {
                    index,
                    team: mission.team,
                });
            }
            if mission.fails as usize > mission.team.len() {
                return Err(ProposalError::InvalidFails {
                    index,
                    fails: mission.fails,
                });
            }
        }
        Ok(())
    }

    /// Expands the log into `(state, observation)` steps: each mission yields a
    /// proposal step followed by the mission step.
    pub fn history(&self) -> Result<Vec<(ProposalState, ProposalObservation)>, ProposalError> {
        self.validate()?;
        let game = ProposalGame::new(self.rules);
        let mut state = game.initial_state();
        let mut steps = Vec::with_capacity(self.missions.len() * 2);
        for mission in &self.missions {
            steps.push((state, ProposalObservation::Proposed(mission.team)));
            state = state.with_proposal(mission.team);
            steps.push((state, ProposalObservation::Mission { fails: mission.fails }));
            state = state.after_mission(mission.fails > 0);
        }
        Ok(steps)
    }

    /// Public state after the last recorded mission.
    pub fn final_state(&self) -> ProposalState {
        self.missions
            .iter()
            .fold(ProposalState::default(), |state, mission| {
                state
                    .with_proposal(mission.team)
                    .after_mission(mission.fails > 0)
            })
    }
}

#[derive(Debug)]
pub enum ProposalError {
    InvalidRules(String),
    TooManyMissions { rounds: u8, missions: usize },
    InvalidTeam { index: usize, team: Team },
    InvalidFails { index: usize, fails: u8 },
    Json(serde_json::Error),
}

impl fmt::Display for ProposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalError::InvalidRules(message) => write!(f, "invalid rules: {message}"),
            ProposalError::TooManyMissions { rounds, missions } => {
                write!(f, "record has {missions} missions but the game only has {rounds} rounds")
            }
            ProposalError::InvalidTeam { index, team } => {
                write!(f, "mission {index} sends invalid team {team}")
            }
            ProposalError::InvalidFails { index, fails } => {
                write!(f, "mission {index} reports {fails} fails, more than its team size")
            }
            ProposalError::Json(err) => write!(f, "malformed record: {err}"),
        }
    }
}

impl std::error::Error for ProposalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProposalError::Json(err) => Some(err),
            _ => None,
        }
    }
}
