//! Service layer over the repository traits.
//!
//! Thin, backend-agnostic functions that downstream components (transfer
//! windows, scoring periods) call to load ledgers and query rounds.

use log::{debug, info};

use super::repository::{FullRepository, RepositoryResult};
use crate::models::{Match, MatchInput, Round, SeasonId};

/// Check if the repository connection is healthy.
pub async fn health_check(repo: &dyn FullRepository) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Replace the ledger of a season, discarding its rounds.
///
/// # Returns
/// * `Ok(usize)` - Number of matches stored
pub async fn store_ledger(
    repo: &dyn FullRepository,
    season: SeasonId,
    matches: &[MatchInput],
) -> RepositoryResult<usize> {
    info!(
        "Storing ledger for season {} ({} matches)",
        season,
        matches.len()
    );
    let stored = repo.store_matches(season, matches).await?;
    debug!("Season {} ledger stored, rounds cleared", season);
    Ok(stored)
}

/// List the seasons with a stored ledger.
pub async fn list_seasons(repo: &dyn FullRepository) -> RepositoryResult<Vec<SeasonId>> {
    repo.list_seasons().await
}

/// Fetch the ledger of a season ordered by sequence number.
pub async fn fetch_ledger(
    repo: &dyn FullRepository,
    season: SeasonId,
) -> RepositoryResult<Vec<Match>> {
    repo.fetch_matches(season).await
}

/// List the stored rounds of a season ordered by round number.
pub async fn list_rounds(repo: &dyn FullRepository, season: SeasonId) -> RepositoryResult<Vec<Round>> {
    repo.fetch_rounds(season).await
}

/// Fetch one round by number.
pub async fn get_round(
    repo: &dyn FullRepository,
    season: SeasonId,
    round_number: u32,
) -> RepositoryResult<Round> {
    repo.get_round(season, round_number).await
}

/// Which round is match `sequence_number` in.
///
/// `Ok(None)` means the match exists but the season has no rounds yet.
pub async fn round_for_match(
    repo: &dyn FullRepository,
    season: SeasonId,
    sequence_number: u32,
) -> RepositoryResult<Option<Round>> {
    repo.round_for_match(season, sequence_number).await
}

/// Which matches belong to round `round_number`.
pub async fn matches_for_round(
    repo: &dyn FullRepository,
    season: SeasonId,
    round_number: u32,
) -> RepositoryResult<Vec<Match>> {
    repo.matches_for_round(season, round_number).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::models::TeamId;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_store_ledger_then_list() {
        let repo = LocalRepository::new();
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let ledger = vec![
            MatchInput {
                sequence_number: 1,
                team_a: TeamId(1),
                team_b: TeamId(2),
                timestamp: ts,
            },
            MatchInput {
                sequence_number: 2,
                team_a: TeamId(2),
                team_b: TeamId(1),
                timestamp: ts,
            },
        ];

        assert_eq!(store_ledger(&repo, SeasonId(4), &ledger).await.unwrap(), 2);
        assert_eq!(list_seasons(&repo).await.unwrap(), vec![SeasonId(4)]);
        assert_eq!(fetch_ledger(&repo, SeasonId(4)).await.unwrap().len(), 2);
        assert!(list_rounds(&repo, SeasonId(4)).await.unwrap().is_empty());
        assert_eq!(round_for_match(&repo, SeasonId(4), 1).await.unwrap(), None);
        assert!(health_check(&repo).await.unwrap());
    }
}
