//! Boundary scorer.
//!
//! Rates every sequence number as a potential round boundary by how evenly the
//! teams' cumulative match counts are spread at that point. Lower scores are
//! better.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::participation::ParticipationTable;

/// Guard against division by zero in the coefficient of variation.
pub const CV_EPSILON: f64 = 1e-10;
/// Weight of the raw spread in the balance score.
pub const SPREAD_WEIGHT: f64 = 0.7;
/// Weight of the coefficient of variation in the balance score.
pub const CV_WEIGHT: f64 = 0.3;
/// Multiplier applied to candidates whose spread is within tolerance.
pub const WITHIN_TOLERANCE_BONUS: f64 = 0.5;

/// Balance statistics at one sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCandidate {
    pub sequence_number: u32,
    pub min_count: u32,
    pub max_count: u32,
    pub mean_count: f64,
    /// Population standard deviation of the per-team counts
    pub std_count: f64,
    pub spread: u32,
    pub within_tolerance: bool,
    pub coefficient_of_variation: f64,
    pub balance_score: f64,
}

impl BoundaryCandidate {
    /// Compute the statistics for one snapshot of cumulative counts.
    ///
    /// `counts` must be non-empty.
    pub fn from_counts(sequence_number: u32, counts: &[u32], tolerance: u32) -> Self {
        let n = counts.len() as f64;
        let min_count = counts.iter().copied().min().unwrap_or(0);
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let mean_count = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
        let variance = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - mean_count;
                d * d
            })
            .sum::<f64>()
            / n;
        let std_count = variance.sqrt();

        let spread = max_count - min_count;
        let within_tolerance = spread <= tolerance;
        let coefficient_of_variation = std_count / mean_count.max(CV_EPSILON);

        let mut balance_score = SPREAD_WEIGHT * spread as f64 + CV_WEIGHT * coefficient_of_variation;
        if within_tolerance {
            balance_score *= WITHIN_TOLERANCE_BONUS;
        }

        Self {
            sequence_number,
            min_count,
            max_count,
            mean_count,
            std_count,
            spread,
            within_tolerance,
            coefficient_of_variation,
            balance_score,
        }
    }

    /// Ranking order: best (lowest) score first, ties broken by the earlier sequence number.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.balance_score
            .total_cmp(&other.balance_score)
            .then(self.sequence_number.cmp(&other.sequence_number))
    }
}

/// Score every sequence number `1..=N` of the season.
///
/// Returns an empty list when the table has no teams.
pub fn score_boundaries(table: &ParticipationTable, tolerance: u32) -> Vec<BoundaryCandidate> {
    if table.teams().is_empty() {
        return Vec::new();
    }

    (1..=table.last_sequence())
        .filter_map(|m| {
            table
                .snapshot(m)
                .map(|counts| BoundaryCandidate::from_counts(m, counts, tolerance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Match, SeasonId, TeamId};
    use chrono::{Duration, TimeZone, Utc};

    fn table(pairs: &[(i64, i64)]) -> ParticipationTable {
        let start = Utc.with_ymd_and_hms(2024, 3, 22, 14, 0, 0).unwrap();
        let ledger: Vec<Match> = pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| Match {
                id: None,
                season: SeasonId(1),
                sequence_number: i as u32 + 1,
                team_a: TeamId(*a),
                team_b: TeamId(*b),
                timestamp: start + Duration::days(i as i64),
                round_id: None,
            })
            .collect();
        ParticipationTable::from_ledger(SeasonId(1), &ledger).unwrap()
    }

    #[test]
    fn test_one_candidate_per_sequence_number() {
        let t = table(&[(1, 2), (3, 4), (1, 3), (2, 4), (1, 4), (2, 3)]);
        let candidates = score_boundaries(&t, 1);
        assert_eq!(candidates.len(), 6);
        for (i, c) in candidates.iter().enumerate() {
            assert_eq!(c.sequence_number, i as u32 + 1);
        }
    }

    #[test]
    fn test_statistics_use_population_std() {
        let t = table(&[(1, 2), (2, 3)]);
        let c = &score_boundaries(&t, 1)[0];

        // counts after match 1: [1, 1, 0]
        assert_eq!(c.min_count, 0);
        assert_eq!(c.max_count, 1);
        assert_eq!(c.spread, 1);
        assert!(c.within_tolerance);
        assert!((c.mean_count - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.std_count - (2.0f64 / 9.0).sqrt()).abs() < 1e-12);
        assert!((c.coefficient_of_variation - 0.5f64.sqrt()).abs() < 1e-9);

        let expected = (0.7 + 0.3 * 0.5f64.sqrt()) * 0.5;
        assert!((c.balance_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bonus_only_applies_within_tolerance() {
        let t = table(&[(1, 2), (2, 3)]);
        let strict = &score_boundaries(&t, 0)[0];
        let relaxed = &score_boundaries(&t, 1)[0];

        assert!(!strict.within_tolerance);
        assert!(relaxed.within_tolerance);
        assert!((strict.balance_score - 2.0 * relaxed.balance_score).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_balance_scores_zero() {
        let t = table(&[(1, 2), (1, 2), (2, 1)]);
        for c in score_boundaries(&t, 0) {
            assert_eq!(c.spread, 0);
            assert_eq!(c.std_count, 0.0);
            assert_eq!(c.coefficient_of_variation, 0.0);
            assert_eq!(c.balance_score, 0.0);
            assert!(c.within_tolerance);
        }
    }

    #[test]
    fn test_zero_mean_does_not_divide_by_zero() {
        let c = BoundaryCandidate::from_counts(1, &[0, 0, 0], 1);
        assert_eq!(c.coefficient_of_variation, 0.0);
        assert!(c.balance_score.is_finite());
    }

    #[test]
    fn test_rank_cmp_breaks_ties_by_sequence_number() {
        let a = BoundaryCandidate::from_counts(4, &[2, 2], 0);
        let b = BoundaryCandidate::from_counts(2, &[1, 1], 0);
        assert_eq!(a.balance_score, b.balance_score);
        assert_eq!(b.rank_cmp(&a), Ordering::Less);

        let worse = BoundaryCandidate::from_counts(1, &[1, 0], 0);
        assert_eq!(b.rank_cmp(&worse), Ordering::Less);
    }
}
