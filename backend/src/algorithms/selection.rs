//! Boundary selector.
//!
//! Greedy, single-pass search over scored candidates. Picks an anchor early in
//! the season, then repeatedly looks for the best-scoring candidate roughly
//! `spacing` matches past the previous boundary, widening the search when the
//! balanced candidates run out. The result always ends at the season's final
//! sequence number.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::SeasonId;

use super::error::{EngineResult, RoundEngineError};
use super::params::{RoundParameters, MIN_SPACING};
use super::scoring::BoundaryCandidate;

/// The anchor is searched for among sequence numbers up to this value.
pub const ANCHOR_WINDOW: u32 = 15;
/// Below this many within-tolerance candidates the balance constraint is relaxed.
pub const MIN_TOLERANT_CANDIDATES: usize = 5;
/// Half-width of the first search window around the spacing target.
pub const NARROW_RADIUS: u32 = 2;
/// Half-width of the second search window.
pub const WIDE_RADIUS: u32 = 4;
/// Minimum distance past the previous boundary for the score-agnostic fallbacks.
/// Remainders at or below this length are folded into a final round.
pub const MIN_ROUND_GAP: u32 = 3;

/// Which rule produced a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStep {
    /// Best candidate within the anchor window
    Anchor,
    /// Best candidate overall, the anchor window had none
    AnchorFallback,
    /// Best candidate within `±NARROW_RADIUS` of the spacing target
    NarrowWindow,
    /// Best candidate within `±WIDE_RADIUS` of the spacing target
    WideWindow,
    /// Best candidate more than `MIN_ROUND_GAP` past the previous boundary
    NextCandidate,
    /// Best sequence number past the gap, ignoring the tolerance filter
    Unfiltered,
    /// Short remainder folded into the final round
    SeasonEnd,
    /// Final sequence number appended after hitting `max_rounds`
    RoundCap,
    /// Next sequence number taken because nothing else qualified
    ForcedProgress,
}

/// Outcome of one selector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundarySelection {
    /// Strictly increasing, ends at the final sequence number
    pub boundaries: Vec<u32>,
    /// Rule that produced each entry of `boundaries`
    pub steps: Vec<SelectionStep>,
    /// Whether every sequence number was admitted to the candidate pool
    pub relaxed_pool: bool,
}

impl BoundarySelection {
    fn push(&mut self, boundary: u32, step: SelectionStep) {
        debug!("Selected boundary {} via {:?}", boundary, step);
        self.boundaries.push(boundary);
        self.steps.push(step);
    }

    pub fn last(&self) -> Option<u32> {
        self.boundaries.last().copied()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

/// Spacing to aim for given how many matches remain after the previous boundary.
///
/// Late in the season the target shrinks to half the remainder (never below
/// [`MIN_SPACING`]) so the last rounds are neither starved nor pushed past the end.
pub fn effective_spacing(spacing: u32, remainder: u32) -> u32 {
    if remainder < spacing.saturating_mul(2) {
        (remainder / 2).max(MIN_SPACING)
    } else {
        spacing
    }
}

/// Choose round boundaries for a season from its scored candidates.
///
/// `candidates` holds one entry per sequence number `1..=N`, in any order.
pub fn select_boundaries(
    season: SeasonId,
    candidates: &[BoundaryCandidate],
    params: &RoundParameters,
) -> EngineResult<BoundarySelection> {
    params.validate()?;

    let last = candidates
        .iter()
        .map(|c| c.sequence_number)
        .max()
        .ok_or_else(|| RoundEngineError::insufficient_data(season, "no boundary candidates"))?;

    let mut ranked: Vec<&BoundaryCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| a.rank_cmp(b));

    let mut pool: Vec<&BoundaryCandidate> = ranked
        .iter()
        .copied()
        .filter(|c| c.within_tolerance)
        .collect();
    let mut selection = BoundarySelection::default();
    if pool.len() < MIN_TOLERANT_CANDIDATES {
        warn!(
            "Season {}: only {} candidates within tolerance {}, relaxing balance constraint",
            season,
            pool.len(),
            params.tolerance
        );
        pool = ranked.clone();
        selection.relaxed_pool = true;
    }

    if last <= MIN_ROUND_GAP {
        selection.push(last, SelectionStep::SeasonEnd);
        return Ok(selection);
    }

    match pool.iter().find(|c| c.sequence_number <= ANCHOR_WINDOW) {
        Some(c) => selection.push(c.sequence_number, SelectionStep::Anchor),
        None => selection.push(pool[0].sequence_number, SelectionStep::AnchorFallback),
    }

    while let Some(prev) = selection.last() {
        if prev >= last {
            break;
        }
        if selection.len() >= params.max_rounds as usize {
            selection.push(last, SelectionStep::RoundCap);
            break;
        }
        let (next, step) = next_boundary(&pool, &ranked, prev, last, params.spacing);
        if matches!(step, SelectionStep::Unfiltered | SelectionStep::ForcedProgress) {
            warn!(
                "Season {}: no balanced candidate after {}, took {} via {:?}",
                season, prev, next, step
            );
        }
        selection.push(next, step);
    }

    verify_boundaries(season, &selection.boundaries, last)?;
    Ok(selection)
}

/// Pick the boundary following `prev`.
///
/// `pool` and `ranked` are both sorted best-first; `ranked` holds every candidate.
fn next_boundary(
    pool: &[&BoundaryCandidate],
    ranked: &[&BoundaryCandidate],
    prev: u32,
    last: u32,
    spacing: u32,
) -> (u32, SelectionStep) {
    let remainder = last - prev;
    let target = prev + effective_spacing(spacing, remainder);
    let admissible = |seq: u32| seq > prev && seq <= last;
    let in_window = |seq: u32, radius: u32| {
        admissible(seq) && seq > target.saturating_sub(radius) && seq <= target + radius
    };

    if let Some(c) = pool.iter().find(|c| in_window(c.sequence_number, NARROW_RADIUS)) {
        return (c.sequence_number, SelectionStep::NarrowWindow);
    }
    if let Some(c) = pool.iter().find(|c| in_window(c.sequence_number, WIDE_RADIUS)) {
        return (c.sequence_number, SelectionStep::WideWindow);
    }

    let past_gap = |seq: u32| admissible(seq) && seq > prev + MIN_ROUND_GAP;
    if let Some(c) = pool.iter().find(|c| past_gap(c.sequence_number)) {
        return (c.sequence_number, SelectionStep::NextCandidate);
    }

    if remainder > MIN_ROUND_GAP {
        if let Some(c) = ranked.iter().find(|c| past_gap(c.sequence_number)) {
            return (c.sequence_number, SelectionStep::Unfiltered);
        }
        return (prev + 1, SelectionStep::ForcedProgress);
    }

    (last, SelectionStep::SeasonEnd)
}

/// Check the selector contract: non-empty, strictly increasing, starting
/// after 0 and ending exactly at `last`.
pub fn verify_boundaries(season: SeasonId, boundaries: &[u32], last: u32) -> EngineResult<()> {
    let Some(&final_boundary) = boundaries.last() else {
        return Err(RoundEngineError::coverage(season, "no boundaries selected"));
    };
    if boundaries[0] == 0 {
        return Err(RoundEngineError::coverage(
            season,
            "first boundary must be at least 1",
        ));
    }
    if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
        return Err(RoundEngineError::coverage(
            season,
            format!(
                "boundaries not strictly increasing: {} followed by {}",
                pair[0], pair[1]
            ),
        ));
    }
    if final_boundary != last {
        return Err(RoundEngineError::coverage(
            season,
            format!(
                "last boundary {} does not reach final match {}",
                final_boundary, last
            ),
        ));
    }
    Ok(())
}
