//! Match ledger types.
//!
//! A season's ledger is the ordered list of matches supplied by the fixture
//! import collaborator. The round engine only ever reads it; the sole field it
//! writes back is the nullable `round_id` reference, and only through the
//! repository's atomic round replacement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::define_id_type;

define_id_type!(i32, SeasonId);
define_id_type!(i64, TeamId);
define_id_type!(i64, MatchId);
define_id_type!(i64, RoundId);

/// A single match of a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Store-assigned identifier (`None` until persisted)
    #[serde(default)]
    pub id: Option<MatchId>,
    pub season: SeasonId,
    /// Position in the season, contiguous from 1
    pub sequence_number: u32,
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub timestamp: DateTime<Utc>,
    /// Round currently containing this match, maintained by the materializer
    #[serde(default)]
    pub round_id: Option<RoundId>,
}

impl Match {
    /// Whether `team` is one of the two participants.
    pub fn involves(&self, team: TeamId) -> bool {
        self.team_a == team || self.team_b == team
    }

    pub fn teams(&self) -> [TeamId; 2] {
        [self.team_a, self.team_b]
    }
}

/// Collaborator-supplied match row used to (re)load a season's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInput {
    pub sequence_number: u32,
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub timestamp: DateTime<Utc>,
}

impl MatchInput {
    pub fn into_match(self, season: SeasonId) -> Match {
        Match {
            id: None,
            season,
            sequence_number: self.sequence_number,
            team_a: self.team_a,
            team_b: self.team_b,
            timestamp: self.timestamp,
            round_id: None,
        }
    }
}

impl From<&Match> for MatchInput {
    fn from(m: &Match) -> Self {
        Self {
            sequence_number: m.sequence_number,
            team_a: m.team_a,
            team_b: m.team_b,
            timestamp: m.timestamp,
        }
    }
}
