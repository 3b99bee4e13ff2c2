//! Round materializer (pure part).
//!
//! Turns selected boundaries into concrete [`Round`] records. Writing them to a
//! store is the repository's job; see `RoundRepository::replace_rounds`.

use std::collections::BTreeMap;

use crate::models::{Match, Round, SeasonId, TeamId};

use super::error::{EngineResult, RoundEngineError};
use super::participation::ParticipationTable;

/// Build one round per boundary, with `0` as the implicit boundary before the first.
///
/// `ordered` must be the ledger in sequence order (as returned by `order_ledger`),
/// so `ordered[m - 1]` is match `m`.
pub fn materialize_rounds(
    boundaries: &[u32],
    table: &ParticipationTable,
    ordered: &[&Match],
) -> EngineResult<Vec<Round>> {
    let season = table.season();
    let mut rounds = Vec::with_capacity(boundaries.len());
    let mut prev = 0u32;

    for (idx, &boundary) in boundaries.iter().enumerate() {
        if boundary <= prev {
            return Err(RoundEngineError::coverage(
                season,
                format!("boundary {} does not follow {}", boundary, prev),
            ));
        }
        let team_matches = table.played_between(prev, boundary).ok_or_else(|| {
            RoundEngineError::coverage(
                season,
                format!("boundary {} is beyond the final match", boundary),
            )
        })?;

        let first_match = prev + 1;
        let last_match = boundary;
        let start_time = match_at(season, ordered, first_match)?.timestamp;
        let end_time = match_at(season, ordered, last_match)?.timestamp;

        let min_team_matches = team_matches.values().copied().min().unwrap_or(0);
        let max_team_matches = team_matches.values().copied().max().unwrap_or(0);

        rounds.push(Round {
            id: None,
            season,
            round_number: idx as u32 + 1,
            first_match,
            last_match,
            matches_in_round: last_match - first_match + 1,
            min_team_matches,
            max_team_matches,
            is_balanced: min_team_matches == max_team_matches,
            team_matches,
            start_time,
            end_time,
            days_in_round: (end_time.date_naive() - start_time.date_naive()).num_days() + 1,
        });
        prev = boundary;
    }

    Ok(rounds)
}

fn match_at<'a>(
    season: SeasonId,
    ordered: &[&'a Match],
    sequence_number: u32,
) -> EngineResult<&'a Match> {
    sequence_number
        .checked_sub(1)
        .and_then(|i| ordered.get(i as usize))
        .copied()
        .ok_or_else(|| {
            RoundEngineError::coverage(
                season,
                format!("match {} missing from ledger", sequence_number),
            )
        })
}

/// Check that `rounds` partition `1..=N`, are numbered from 1, carry consistent
/// balance flags, and conserve every team's season total.
pub fn verify_rounds(rounds: &[Round], table: &ParticipationTable) -> EngineResult<()> {
    let season = table.season();
    let mut expected_first = 1u32;

    for (idx, round) in rounds.iter().enumerate() {
        if round.round_number != idx as u32 + 1 {
            return Err(RoundEngineError::coverage(
                season,
                format!(
                    "round at position {} is numbered {}",
                    idx + 1,
                    round.round_number
                ),
            ));
        }
        if round.first_match != expected_first || round.last_match < round.first_match {
            return Err(RoundEngineError::coverage(
                season,
                format!(
                    "round {} covers {}..={}, expected to start at {}",
                    round.round_number, round.first_match, round.last_match, expected_first
                ),
            ));
        }
        if round.is_balanced != (round.min_team_matches == round.max_team_matches) {
            return Err(RoundEngineError::coverage(
                season,
                format!("round {} has an inconsistent balance flag", round.round_number),
            ));
        }
        expected_first = round.last_match + 1;
    }

    if expected_first != table.last_sequence() + 1 {
        return Err(RoundEngineError::coverage(
            season,
            format!(
                "rounds end at {}, season ends at {}",
                expected_first.saturating_sub(1),
                table.last_sequence()
            ),
        ));
    }

    let mut summed: BTreeMap<TeamId, u32> = BTreeMap::new();
    for round in rounds {
        for (team, count) in &round.team_matches {
            *summed.entry(*team).or_default() += count;
        }
    }
    summed.retain(|_, count| *count > 0);
    let mut totals = table.totals();
    totals.retain(|_, count| *count > 0);
    if summed != totals {
        return Err(RoundEngineError::coverage(
            season,
            "per-round team counts do not add up to season totals",
        ));
    }

    Ok(())
}
