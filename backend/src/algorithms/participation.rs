//! Participation accumulator.
//!
//! Derives, for every team and every sequence number `m`, how many matches the
//! team has played with sequence number `<= m`. Built in one forward scan over
//! the ordered ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{Match, SeasonId, TeamId};

use super::error::{EngineResult, RoundEngineError};

/// Order a season's ledger by sequence number and check its structure.
///
/// The ledger must be non-empty, belong to `season`, never pair a team with
/// itself, and number its matches `1..=N` without gaps or duplicates.
pub fn order_ledger(season: SeasonId, ledger: &[Match]) -> EngineResult<Vec<&Match>> {
    if ledger.is_empty() {
        return Err(RoundEngineError::insufficient_data(
            season,
            "ledger contains no matches",
        ));
    }

    let mut ordered: Vec<&Match> = ledger.iter().collect();
    ordered.sort_by_key(|m| m.sequence_number);

    for (idx, m) in ordered.iter().enumerate() {
        if m.season != season {
            return Err(RoundEngineError::invalid_ledger(
                season,
                format!(
                    "match {} belongs to season {}",
                    m.sequence_number, m.season
                ),
            ));
        }
        let expected = idx as u32 + 1;
        if m.sequence_number != expected {
            let message = if m.sequence_number < expected {
                format!("duplicate sequence number {}", m.sequence_number)
            } else {
                format!(
                    "sequence numbers must be contiguous from 1: expected {}, found {}",
                    expected, m.sequence_number
                )
            };
            return Err(RoundEngineError::invalid_ledger(season, message));
        }
        if m.team_a == m.team_b {
            return Err(RoundEngineError::invalid_ledger(
                season,
                format!("match {} pairs team {} with itself", expected, m.team_a),
            ));
        }
    }

    Ok(ordered)
}

/// Cumulative match counts per team, indexed by sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationTable {
    season: SeasonId,
    /// Teams in ascending id order; column order of every row
    teams: Vec<TeamId>,
    /// `rows[m][t]` is the count for `teams[t]` after match `m`; `rows[0]` is all zeros
    rows: Vec<Vec<u32>>,
}

impl ParticipationTable {
    /// Accumulate counts over an unordered ledger.
    pub fn from_ledger(season: SeasonId, ledger: &[Match]) -> EngineResult<Self> {
        let ordered = order_ledger(season, ledger)?;
        Ok(Self::from_ordered(season, &ordered))
    }

    /// Accumulate counts over a ledger already checked by [`order_ledger`].
    pub fn from_ordered(season: SeasonId, ordered: &[&Match]) -> Self {
        let teams: Vec<TeamId> = ordered
            .iter()
            .flat_map(|m| m.teams())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<TeamId, usize> =
            teams.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let mut running = vec![0u32; teams.len()];
        let mut rows = Vec::with_capacity(ordered.len() + 1);
        rows.push(running.clone());

        for m in ordered {
            for team in m.teams() {
                running[index[&team]] += 1;
            }
            rows.push(running.clone());
        }

        Self {
            season,
            teams,
            rows,
        }
    }

    pub fn season(&self) -> SeasonId {
        self.season
    }

    pub fn teams(&self) -> &[TeamId] {
        &self.teams
    }

    /// Final sequence number `N` of the season.
    pub fn last_sequence(&self) -> u32 {
        (self.rows.len() - 1) as u32
    }

    /// Counts of every team (in [`teams`](Self::teams) order) after `sequence_number`.
    ///
    /// Sequence number 0 is the implicit start of the season.
    pub fn snapshot(&self, sequence_number: u32) -> Option<&[u32]> {
        self.rows.get(sequence_number as usize).map(Vec::as_slice)
    }

    /// Count for one team after `sequence_number`.
    pub fn cumulative(&self, team: TeamId, sequence_number: u32) -> Option<u32> {
        let column = self.teams.binary_search(&team).ok()?;
        self.snapshot(sequence_number).map(|row| row[column])
    }

    /// Matches each team plays in the half-open sequence range `(from, to]`.
    pub fn played_between(&self, from: u32, to: u32) -> Option<BTreeMap<TeamId, u32>> {
        let start = self.snapshot(from)?;
        let end = self.snapshot(to)?;
        Some(
            self.teams
                .iter()
                .zip(start.iter().zip(end))
                .map(|(team, (s, e))| (*team, e.saturating_sub(*s)))
                .collect(),
        )
    }

    /// Season totals per team.
    pub fn totals(&self) -> BTreeMap<TeamId, u32> {
        self.played_between(0, self.last_sequence())
            .unwrap_or_default()
    }
}
