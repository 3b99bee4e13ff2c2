//! Summary statistics over a season's rounds.

use serde::{Deserialize, Serialize};

use crate::models::Round;

/// Aggregate view of a round layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPlanSummary {
    pub round_count: usize,
    pub balanced_rounds: usize,
    pub total_matches: u32,
    pub min_round_length: u32,
    pub max_round_length: u32,
    pub mean_round_length: f64,
    /// Largest `max_team_matches - min_team_matches` of any round.
    pub worst_spread: u32,
    /// Round with the largest spread; the earliest one on ties.
    pub worst_spread_round: Option<u32>,
}

impl RoundPlanSummary {
    /// Share of rounds in which every team played equally often.
    pub fn balanced_ratio(&self) -> f64 {
        if self.round_count == 0 {
            0.0
        } else {
            self.balanced_rounds as f64 / self.round_count as f64
        }
    }
}

/// Summarize stored or previewed rounds.
pub fn summarize_plan(rounds: &[Round]) -> RoundPlanSummary {
    let lengths: Vec<u32> = rounds.iter().map(|r| r.matches_in_round).collect();
    let total_matches: u32 = lengths.iter().sum();

    let worst = rounds
        .iter()
        .map(|r| (r.spread(), r.round_number))
        .fold(None, |best: Option<(u32, u32)>, (spread, number)| match best {
            Some((s, _)) if s >= spread => best,
            _ => Some((spread, number)),
        });

    RoundPlanSummary {
        round_count: rounds.len(),
        balanced_rounds: rounds.iter().filter(|r| r.is_balanced).count(),
        total_matches,
        min_round_length: lengths.iter().copied().min().unwrap_or(0),
        max_round_length: lengths.iter().copied().max().unwrap_or(0),
        mean_round_length: if rounds.is_empty() {
            0.0
        } else {
            f64::from(total_matches) / rounds.len() as f64
        },
        worst_spread: worst.map_or(0, |(s, _)| s),
        worst_spread_round: worst.map(|(_, n)| n),
    }
}
