//! Fixture repository trait for the per-season match ledger.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Match, MatchInput, SeasonId};

/// Repository trait for match ledger storage.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait FixtureRepository: Send + Sync {
    /// Check if the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Replace the ledger of a season.
    ///
    /// Existing matches and rounds of the season are discarded, since rounds
    /// computed against an older ledger no longer describe it.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of matches stored
    /// * `Err(RepositoryError)` - If the operation fails
    async fn store_matches(
        &self,
        season: SeasonId,
        matches: &[MatchInput],
    ) -> RepositoryResult<usize>;

    /// Fetch every match of a season ordered by sequence number.
    ///
    /// An unknown season yields an empty vector.
    async fn fetch_matches(&self, season: SeasonId) -> RepositoryResult<Vec<Match>>;

    /// Fetch a single match by its sequence number.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no such match exists
    async fn get_match(&self, season: SeasonId, sequence_number: u32) -> RepositoryResult<Match>;

    /// List the seasons that have at least one stored match, ascending.
    async fn list_seasons(&self) -> RepositoryResult<Vec<SeasonId>>;
}
