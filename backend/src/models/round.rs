//! Persisted round records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fixture::{RoundId, SeasonId, TeamId};

/// A contiguous block of matches within a season.
///
/// Rounds of one season partition the sequence range `1..=N` with no gaps and
/// no overlaps. They are regenerated as a whole on every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Store-assigned identifier (`None` for computed, unsaved rounds)
    #[serde(default)]
    pub id: Option<RoundId>,
    pub season: SeasonId,
    /// 1-based position within the season
    pub round_number: u32,
    pub first_match: u32,
    pub last_match: u32,
    pub matches_in_round: u32,
    pub min_team_matches: u32,
    pub max_team_matches: u32,
    pub is_balanced: bool,
    /// Matches played by each team inside this round
    pub team_matches: BTreeMap<TeamId, u32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub days_in_round: i64,
}

impl Round {
    /// Whether the match with `sequence_number` belongs to this round.
    pub fn contains(&self, sequence_number: u32) -> bool {
        (self.first_match..=self.last_match).contains(&sequence_number)
    }

    pub fn spread(&self) -> u32 {
        self.max_team_matches.saturating_sub(self.min_team_matches)
    }

    /// Copy of this round with a new identifier, used by stores on insert.
    pub fn with_id(&self, id: RoundId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }
}
