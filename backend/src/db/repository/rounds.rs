//! Round repository trait and the layout checks shared by its implementations.

use async_trait::async_trait;

use super::error::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{Match, Round, SeasonId};

/// Repository trait for materialized rounds.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait RoundRepository: Send + Sync {
    /// Atomically replace the rounds of a season.
    ///
    /// The write runs as one unit: clear every match's round reference,
    /// delete the existing rounds, insert the new ones and reassign each match
    /// to the round whose range contains it. Any failure leaves the previously
    /// committed rounds untouched.
    ///
    /// # Returns
    /// * `Ok(Vec<Round>)` - The inserted rounds with their assigned ids
    /// * `Err(RepositoryError::ValidationError)` - If the layout does not
    ///   partition the stored ledger
    async fn replace_rounds(
        &self,
        season: SeasonId,
        rounds: &[Round],
    ) -> RepositoryResult<Vec<Round>>;

    /// Fetch the rounds of a season ordered by round number.
    async fn fetch_rounds(&self, season: SeasonId) -> RepositoryResult<Vec<Round>>;

    /// Fetch a single round by number.
    async fn get_round(&self, season: SeasonId, round_number: u32) -> RepositoryResult<Round>;

    /// Find the round a match was assigned to.
    ///
    /// # Returns
    /// * `Ok(None)` - If the match exists but no rounds have been computed
    /// * `Err(RepositoryError::NotFound)` - If the match does not exist
    async fn round_for_match(
        &self,
        season: SeasonId,
        sequence_number: u32,
    ) -> RepositoryResult<Option<Round>>;

    /// Fetch the matches assigned to a round, ordered by sequence number.
    async fn matches_for_round(
        &self,
        season: SeasonId,
        round_number: u32,
    ) -> RepositoryResult<Vec<Match>>;

    /// Delete every round of a season and clear the match references.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of rounds deleted
    async fn delete_rounds(&self, season: SeasonId) -> RepositoryResult<usize>;
}

/// Check that `rounds` partition the ledger `1..=last_sequence` of `season`.
///
/// Rounds must belong to the season, be numbered 1, 2, ... in order and cover
/// contiguous, non-overlapping ranges ending at the last stored match.
pub fn validate_round_layout(
    season: SeasonId,
    rounds: &[Round],
    last_sequence: u32,
) -> RepositoryResult<()> {
    let context = || {
        ErrorContext::new("replace_rounds")
            .with_entity("round")
            .with_season(season)
    };

    if rounds.is_empty() {
        return if last_sequence == 0 {
            Ok(())
        } else {
            Err(RepositoryError::validation_with_context(
                "no rounds supplied for a non-empty ledger",
                context(),
            ))
        };
    }

    let mut expected_first = 1;
    for (idx, round) in rounds.iter().enumerate() {
        let expected_number = idx as u32 + 1;
        if round.season != season {
            return Err(RepositoryError::validation_with_context(
                format!("round {} belongs to season {}", round.round_number, round.season),
                context().with_entity_id(round.round_number),
            ));
        }
        if round.round_number != expected_number {
            return Err(RepositoryError::validation_with_context(
                format!(
                    "expected round number {}, got {}",
                    expected_number, round.round_number
                ),
                context().with_entity_id(round.round_number),
            ));
        }
        if round.first_match != expected_first || round.last_match < round.first_match {
            return Err(RepositoryError::validation_with_context(
                format!(
                    "round {} covers {}..={}, expected to start at {}",
                    round.round_number, round.first_match, round.last_match, expected_first
                ),
                context().with_entity_id(round.round_number),
            ));
        }
        if round.last_match > last_sequence {
            return Err(RepositoryError::validation_with_context(
                format!(
                    "round {} ends at match {} but the ledger ends at {}",
                    round.round_number, round.last_match, last_sequence
                ),
                context().with_entity_id(round.round_number),
            ));
        }
        expected_first = round.last_match + 1;
    }

    if expected_first != last_sequence + 1 {
        return Err(RepositoryError::validation_with_context(
            format!(
                "matches {}..={} are not assigned to any round",
                expected_first, last_sequence
            ),
            context(),
        ));
    }

    Ok(())
}
