use crate::game::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Set of players sent on a mission, stored as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "Vec<PlayerId>", try_from = "Vec<PlayerId>")]
pub struct Team(u16);

impl Team {
    pub const MAX_PLAYERS: usize = 16;

    pub const EMPTY: Team = Team(0);

    pub fn from_members(members: &[PlayerId]) -> Option<Self> {
        let mut mask = 0u16;
        for &member in members {
            if member >= Self::MAX_PLAYERS {
                return None;
            }
            mask |= 1 << member;
        }
        Some(Team(mask))
    }

    pub fn contains(self, player: PlayerId) -> bool {
        player < Self::MAX_PLAYERS && self.0 & (1 << player) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn members(self) -> impl Iterator<Item = PlayerId> {
        (0..Self::MAX_PLAYERS).filter(move |&p| self.contains(p))
    }

    /// Every team of `size` drawn from `players`, in lexicographic order.
    pub fn all_of_size(players: usize, size: usize) -> Vec<Team> {
        let mut teams = Vec::new();
        let mut current = Vec::with_capacity(size);
        collect_combinations(0, players.min(Self::MAX_PLAYERS), size, &mut current, &mut teams);
        teams
    }
}

fn collect_combinations(
    start: usize,
    players: usize,
    size: usize,
    current: &mut Vec<PlayerId>,
    out: &mut Vec<Team>,
) {
    if current.len() == size {
        if let Some(team) = Team::from_members(current) {
            out.push(team);
        }
        return;
    }
    for player in start..players {
        current.push(player);
        collect_combinations(player + 1, players, size, current, out);
        current.pop();
    }
}

impl From<Team> for Vec<PlayerId> {
    fn from(team: Team) -> Self {
        team.members().collect()
    }
}

impl TryFrom<Vec<PlayerId>> for Team {
    type Error = String;

    fn try_from(members: Vec<PlayerId>) -> Result<Self, Self::Error> {
        Team::from_members(&members)
            .ok_or_else(|| format!("team members must be below {}", Team::MAX_PLAYERS))
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, member) in self.members().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{member}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::Team;

    #[test]
    fn combinations_match_lexicographic_order() {
        let teams = Team::all_of_size(3, 2);
        let members: Vec<Vec<usize>> = teams.iter().map(|t| t.members().collect()).collect();
        assert_eq!(members, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
    }

    #[test]
    fn membership_and_len() {
        let team = Team::from_members(&[1, 4]).unwrap();
        assert!(team.contains(1));
        assert!(team.contains(4));
        assert!(!team.contains(0));
        assert_eq!(team.len(), 2);
        assert_eq!(team.to_string(), "{1,4}");
    }

    #[test]
    fn rejects_out_of_range_member() {
        assert!(Team::from_members(&[Team::MAX_PLAYERS]).is_none());
    }

    #[test]
    fn serializes_as_member_list() {
        let team = Team::from_members(&[0, 2]).unwrap();
        let json = serde_json::to_string(&team).unwrap();
        assert_eq!(json, "[0,2]");
        let back: Team = serde_json::from_str(&json).unwrap();
        assert_eq!(back, team);
    }
}
