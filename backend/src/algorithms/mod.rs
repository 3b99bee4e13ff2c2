//! Balanced round partitioning engine.
//!
//! Pipeline, each stage a pure function:
//!
//! ```text
//! ledger ─► participation ─► scoring ─► selection ─► materialize ─► Vec<Round>
//! ```
//!
//! - [`participation`]: cumulative match counts per team and sequence number
//! - [`scoring`]: balance statistics for every candidate boundary
//! - [`selection`]: greedy boundary search
//! - [`materialize`]: boundaries to [`Round`] records, plus coverage checks
//!
//! [`plan_rounds`] runs the whole pipeline. Previews and persisted rounds both
//! come from it, so they cannot diverge.

pub mod error;
pub mod materialize;
pub mod params;
pub mod participation;
pub mod scoring;
pub mod selection;

pub use error::{EngineResult, RoundEngineError};
pub use materialize::{materialize_rounds, verify_rounds};
pub use params::RoundParameters;
pub use participation::{order_ledger, ParticipationTable};
pub use scoring::{score_boundaries, BoundaryCandidate};
pub use selection::{select_boundaries, verify_boundaries, BoundarySelection, SelectionStep};

use serde::{Deserialize, Serialize};

use crate::models::{Match, Round, SeasonId};

/// Everything one engine run produced for a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPlan {
    pub season: SeasonId,
    pub parameters: RoundParameters,
    pub candidates: Vec<BoundaryCandidate>,
    pub selection: BoundarySelection,
    pub rounds: Vec<Round>,
}

impl RoundPlan {
    pub fn boundaries(&self) -> &[u32] {
        &self.selection.boundaries
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Final sequence number of the season.
    pub fn last_sequence(&self) -> u32 {
        self.rounds.last().map(|r| r.last_match).unwrap_or(0)
    }

    /// Re-check the plan against `ledger`: boundaries strictly increasing and
    /// ending at the last match, round ranges partitioning the season and
    /// per-team counts summing to each team's appearances.
    pub fn verify_coverage(&self, ledger: &[Match]) -> EngineResult<()> {
        let table = ParticipationTable::from_ledger(self.season, ledger)?;
        verify_boundaries(self.season, self.boundaries(), table.last_sequence())?;
        verify_rounds(&self.rounds, &table)
    }
}

/// Compute the rounds of `season` from its ledger.
///
/// Fails with `ParameterError` before touching the ledger, `InsufficientData`
/// or `InvalidLedger` for unusable input, and `CoverageViolation` if the result
/// does not partition the season.
pub fn plan_rounds(
    season: SeasonId,
    ledger: &[Match],
    params: &RoundParameters,
) -> EngineResult<RoundPlan> {
    params.validate()?;

    let ordered = order_ledger(season, ledger)?;
    let table = ParticipationTable::from_ordered(season, &ordered);
    let candidates = score_boundaries(&table, params.tolerance);
    if candidates.is_empty() {
        return Err(RoundEngineError::insufficient_data(
            season,
            "no candidates to score",
        ));
    }

    let selection = select_boundaries(season, &candidates, params)?;
    let rounds = materialize_rounds(&selection.boundaries, &table, &ordered)?;
    verify_rounds(&rounds, &table)?;

    Ok(RoundPlan {
        season,
        parameters: *params,
        candidates,
        selection,
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamId;
    use chrono::{Duration, TimeZone, Utc};

    fn ledger(season: SeasonId, pairs: &[(i64, i64)]) -> Vec<Match> {
        let start = Utc.with_ymd_and_hms(2024, 3, 22, 14, 0, 0).unwrap();
        pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| Match {
                id: None,
                season,
                sequence_number: i as u32 + 1,
                team_a: TeamId(*a),
                team_b: TeamId(*b),
                timestamp: start + Duration::days(i as i64),
                round_id: None,
            })
            .collect()
    }

    #[test]
    fn test_two_team_season_is_balanced_everywhere() {
        let pairs: Vec<(i64, i64)> = (0..10)
            .map(|i| if i % 2 == 0 { (1, 2) } else { (2, 1) })
            .collect();
        let season = SeasonId(2023);
        let params = RoundParameters::default().with_tolerance(0).with_spacing(5);

        let plan = plan_rounds(season, &ledger(season, &pairs), &params).unwrap();
        assert_eq!(plan.boundaries().last(), Some(&10));
        assert_eq!(plan.last_sequence(), 10);
        assert!(plan.rounds.iter().all(|r| r.is_balanced));
        assert_eq!(plan.candidates.len(), 10);
    }

    #[test]
    fn test_spacing_longer_than_season() {
        let season = SeasonId(1);
        let plan = plan_rounds(
            season,
            &ledger(season, &[(1, 2), (2, 3), (3, 1)]),
            &RoundParameters::default(),
        )
        .unwrap();
        assert_eq!(plan.boundaries(), &[3]);
        assert_eq!(plan.round_count(), 1);
        assert_eq!(plan.rounds[0].matches_in_round, 3);
    }

    #[test]
    fn test_invalid_parameters_fail_before_ledger_checks() {
        let params = RoundParameters::default().with_spacing(0);
        let err = plan_rounds(SeasonId(1), &[], &params).unwrap_err();
        assert!(matches!(err, RoundEngineError::ParameterError(_)));
    }

    #[test]
    fn test_verify_coverage_rejects_tampered_plan() {
        let pairs: Vec<(i64, i64)> = (0..12)
            .map(|i| [(1, 2), (3, 4), (1, 3), (2, 4)][i % 4])
            .collect();
        let season = SeasonId(5);
        let matches = ledger(season, &pairs);
        let mut plan = plan_rounds(season, &matches, &RoundParameters::default()).unwrap();
        assert!(plan.verify_coverage(&matches).is_ok());

        if let Some(last) = plan.rounds.last_mut() {
            last.last_match -= 1;
        }
        assert!(matches!(
            plan.verify_coverage(&matches),
            Err(RoundEngineError::CoverageViolation { .. })
        ));
    }

    #[test]
    fn test_empty_ledger() {
        let err = plan_rounds(SeasonId(1), &[], &RoundParameters::default()).unwrap_err();
        assert!(matches!(err, RoundEngineError::InsufficientData { .. }));
    }
}
