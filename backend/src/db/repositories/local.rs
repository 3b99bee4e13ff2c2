//! In-memory repository for unit testing and local development.
//!
//! All state sits behind a single `RwLock`. Round replacement stages its work
//! on copies of the season's matches and rounds and swaps them in only after
//! every step succeeded, which gives the same all-or-nothing behaviour as the
//! Postgres transaction.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repository::{
    validate_round_layout, ErrorContext, FixtureRepository, RepositoryError, RepositoryResult,
    RoundRepository,
};
use crate::models::{Match, MatchId, MatchInput, Round, RoundId, SeasonId};

#[derive(Debug)]
struct LocalData {
    matches: HashMap<SeasonId, Vec<Match>>,
    rounds: HashMap<SeasonId, Vec<Round>>,
    next_match_id: i64,
    next_round_id: i64,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            matches: HashMap::new(),
            rounds: HashMap::new(),
            next_match_id: 1,
            next_round_id: 1,
        }
    }
}

/// In-memory implementation of [`FixtureRepository`] and [`RoundRepository`].
#[derive(Debug, Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
    is_healthy: Arc<RwLock<bool>>,
    fail_round_writes: Arc<RwLock<bool>>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
            is_healthy: Arc::new(RwLock::new(true)),
            fail_round_writes: Arc::new(RwLock::new(false)),
        }
    }

    /// Mark the repository unhealthy; every operation then fails with a
    /// connection error.
    pub fn set_healthy(&self, healthy: bool) {
        *self.is_healthy.write() = healthy;
    }

    /// Make `replace_rounds` fail after the new rounds were staged but before
    /// matches are reassigned.
    pub fn set_fail_round_writes(&self, fail: bool) {
        *self.fail_round_writes.write() = fail;
    }

    /// Remove every season.
    pub fn clear(&self) {
        *self.data.write() = LocalData::default();
    }

    fn check_health(&self, operation: &str) -> RepositoryResult<()> {
        if *self.is_healthy.read() {
            Ok(())
        } else {
            Err(RepositoryError::connection_with_context(
                "local repository marked unhealthy",
                ErrorContext::new(operation),
            ))
        }
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn match_not_found(season: SeasonId, sequence_number: u32) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("match {} not found", sequence_number),
        ErrorContext::new("get_match")
            .with_entity("match")
            .with_season(season)
            .with_entity_id(sequence_number),
    )
}

fn round_not_found(season: SeasonId, round_number: u32) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("round {} not found", round_number),
        ErrorContext::new("get_round")
            .with_entity("round")
            .with_season(season)
            .with_entity_id(round_number),
    )
}

#[async_trait]
impl FixtureRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(*self.is_healthy.read())
    }

    async fn store_matches(
        &self,
        season: SeasonId,
        matches: &[MatchInput],
    ) -> RepositoryResult<usize> {
        self.check_health("store_matches")?;

        let mut sorted: Vec<MatchInput> = matches.to_vec();
        sorted.sort_by_key(|m| m.sequence_number);
        if let Some(pair) = sorted
            .windows(2)
            .find(|w| w[0].sequence_number == w[1].sequence_number)
        {
            return Err(RepositoryError::validation_with_context(
                format!("duplicate sequence number {}", pair[0].sequence_number),
                ErrorContext::new("store_matches")
                    .with_entity("match")
                    .with_season(season),
            ));
        }

        let mut data = self.data.write();
        let mut next_id = data.next_match_id;
        let stored: Vec<Match> = sorted
            .into_iter()
            .map(|input| {
                let mut m = input.into_match(season);
                m.id = Some(MatchId(next_id));
                next_id += 1;
                m
            })
            .collect();

        let count = stored.len();
        data.next_match_id = next_id;
        data.matches.insert(season, stored);
        data.rounds.remove(&season);
        log::debug!("Stored {} matches for season {}", count, season);
        Ok(count)
    }

    async fn fetch_matches(&self, season: SeasonId) -> RepositoryResult<Vec<Match>> {
        self.check_health("fetch_matches")?;
        let data = self.data.read();
        Ok(data.matches.get(&season).cloned().unwrap_or_default())
    }

    async fn get_match(&self, season: SeasonId, sequence_number: u32) -> RepositoryResult<Match> {
        self.check_health("get_match")?;
        let data = self.data.read();
        data.matches
            .get(&season)
            .and_then(|ms| ms.iter().find(|m| m.sequence_number == sequence_number))
            .cloned()
            .ok_or_else(|| match_not_found(season, sequence_number))
    }

    async fn list_seasons(&self) -> RepositoryResult<Vec<SeasonId>> {
        self.check_health("list_seasons")?;
        let data = self.data.read();
        let mut seasons: Vec<SeasonId> = data
            .matches
            .iter()
            .filter(|(_, ms)| !ms.is_empty())
            .map(|(season, _)| *season)
            .collect();
        seasons.sort();
        Ok(seasons)
    }
}

#[async_trait]
impl RoundRepository for LocalRepository {
    async fn replace_rounds(
        &self,
        season: SeasonId,
        rounds: &[Round],
    ) -> RepositoryResult<Vec<Round>> {
        self.check_health("replace_rounds")?;
        let mut data = self.data.write();

        let mut staged_matches = data.matches.get(&season).cloned().unwrap_or_default();
        let last_sequence = staged_matches.last().map_or(0, |m| m.sequence_number);
        validate_round_layout(season, rounds, last_sequence)?;

        for m in staged_matches.iter_mut() {
            m.round_id = None;
        }

        let mut next_id = data.next_round_id;
        let inserted: Vec<Round> = rounds
            .iter()
            .map(|r| {
                let r = r.with_id(RoundId(next_id));
                next_id += 1;
                r
            })
            .collect();

        if *self.fail_round_writes.read() {
            return Err(RepositoryError::transaction_with_context(
                "round write aborted before match reassignment",
                ErrorContext::new("replace_rounds")
                    .with_entity("round")
                    .with_season(season),
            ));
        }

        for round in &inserted {
            for m in staged_matches
                .iter_mut()
                .filter(|m| round.contains(m.sequence_number))
            {
                m.round_id = round.id;
            }
        }

        data.next_round_id = next_id;
        data.matches.insert(season, staged_matches);
        data.rounds.insert(season, inserted.clone());
        Ok(inserted)
    }

    async fn fetch_rounds(&self, season: SeasonId) -> RepositoryResult<Vec<Round>> {
        self.check_health("fetch_rounds")?;
        let data = self.data.read();
        Ok(data.rounds.get(&season).cloned().unwrap_or_default())
    }

    async fn get_round(&self, season: SeasonId, round_number: u32) -> RepositoryResult<Round> {
        self.check_health("get_round")?;
        let data = self.data.read();
        data.rounds
            .get(&season)
            .and_then(|rs| rs.iter().find(|r| r.round_number == round_number))
            .cloned()
            .ok_or_else(|| round_not_found(season, round_number))
    }

    async fn round_for_match(
        &self,
        season: SeasonId,
        sequence_number: u32,
    ) -> RepositoryResult<Option<Round>> {
        self.check_health("round_for_match")?;
        let data = self.data.read();
        let m = data
            .matches
            .get(&season)
            .and_then(|ms| ms.iter().find(|m| m.sequence_number == sequence_number))
            .ok_or_else(|| match_not_found(season, sequence_number))?;

        Ok(m.round_id.and_then(|round_id| {
            data.rounds
                .get(&season)
                .and_then(|rs| rs.iter().find(|r| r.id == Some(round_id)))
                .cloned()
        }))
    }

    async fn matches_for_round(
        &self,
        season: SeasonId,
        round_number: u32,
    ) -> RepositoryResult<Vec<Match>> {
        self.check_health("matches_for_round")?;
        let data = self.data.read();
        let round_id = data
            .rounds
            .get(&season)
            .and_then(|rs| rs.iter().find(|r| r.round_number == round_number))
            .and_then(|r| r.id)
            .ok_or_else(|| round_not_found(season, round_number))?;

        Ok(data
            .matches
            .get(&season)
            .map(|ms| {
                ms.iter()
                    .filter(|m| m.round_id == Some(round_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_rounds(&self, season: SeasonId) -> RepositoryResult<usize> {
        self.check_health("delete_rounds")?;
        let mut data = self.data.write();
        if let Some(ms) = data.matches.get_mut(&season) {
            for m in ms.iter_mut() {
                m.round_id = None;
            }
        }
        Ok(data.rounds.remove(&season).map_or(0, |rs| rs.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamId;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn inputs(n: u32) -> Vec<MatchInput> {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 14, 0, 0).unwrap();
        (1..=n)
            .map(|seq| MatchInput {
                sequence_number: seq,
                team_a: TeamId(i64::from(seq % 4) + 1),
                team_b: TeamId(i64::from((seq + 1) % 4) + 1),
                timestamp: start + Duration::days(i64::from(seq)),
            })
            .collect()
    }

    fn round(season: SeasonId, number: u32, first: u32, last: u32) -> Round {
        let ts = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        Round {
            id: None,
            season,
            round_number: number,
            first_match: first,
            last_match: last,
            matches_in_round: last - first + 1,
            min_team_matches: 1,
            max_team_matches: 2,
            is_balanced: true,
            team_matches: BTreeMap::new(),
            start_time: ts,
            end_time: ts,
            days_in_round: 1,
        }
    }

    #[tokio::test]
    async fn test_store_and_fetch_matches() {
        let repo = LocalRepository::new();
        let season = SeasonId(2024);
        let mut ledger = inputs(5);
        ledger.reverse();
        assert_eq!(repo.store_matches(season, &ledger).await.unwrap(), 5);

        let fetched = repo.fetch_matches(season).await.unwrap();
        let seqs: Vec<u32> = fetched.iter().map(|m| m.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert!(fetched.iter().all(|m| m.id.is_some() && m.round_id.is_none()));
        assert_eq!(repo.list_seasons().await.unwrap(), vec![season]);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_numbers_rejected() {
        let repo = LocalRepository::new();
        let mut ledger = inputs(3);
        ledger[2].sequence_number = 2;
        let err = repo.store_matches(SeasonId(1), &ledger).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError { .. }));
        assert!(repo.fetch_matches(SeasonId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_rounds_assigns_matches() {
        let repo = LocalRepository::new();
        let season = SeasonId(7);
        repo.store_matches(season, &inputs(6)).await.unwrap();

        let stored = repo
            .replace_rounds(season, &[round(season, 1, 1, 4), round(season, 2, 5, 6)])
            .await
            .unwrap();
        assert!(stored.iter().all(|r| r.id.is_some()));

        let r = repo.round_for_match(season, 5).await.unwrap().unwrap();
        assert_eq!(r.round_number, 2);
        let in_first = repo.matches_for_round(season, 1).await.unwrap();
        assert_eq!(in_first.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_rounds() {
        let repo = LocalRepository::new();
        let season = SeasonId(7);
        repo.store_matches(season, &inputs(6)).await.unwrap();
        let before = repo
            .replace_rounds(season, &[round(season, 1, 1, 6)])
            .await
            .unwrap();

        repo.set_fail_round_writes(true);
        let result = repo
            .replace_rounds(season, &[round(season, 1, 1, 3), round(season, 2, 4, 6)])
            .await;
        assert!(matches!(result, Err(RepositoryError::TransactionError { .. })));

        assert_eq!(repo.fetch_rounds(season).await.unwrap(), before);
        let m = repo.get_match(season, 5).await.unwrap();
        assert_eq!(m.round_id, before[0].id);
    }

    #[tokio::test]
    async fn test_store_matches_discards_stale_rounds() {
        let repo = LocalRepository::new();
        let season = SeasonId(3);
        repo.store_matches(season, &inputs(4)).await.unwrap();
        repo.replace_rounds(season, &[round(season, 1, 1, 4)])
            .await
            .unwrap();

        repo.store_matches(season, &inputs(8)).await.unwrap();
        assert!(repo.fetch_rounds(season).await.unwrap().is_empty());
        assert_eq!(repo.round_for_match(season, 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_lookups() {
        let repo = LocalRepository::new();
        let season = SeasonId(9);
        repo.store_matches(season, &inputs(2)).await.unwrap();
        assert!(matches!(
            repo.get_match(season, 3).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.get_round(season, 1).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(repo.round_for_match(season, 42).await.is_err());
    }

    #[tokio::test]
    async fn test_unhealthy_repository_rejects_operations() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        let err = repo.fetch_matches(SeasonId(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_rounds_clears_references() {
        let repo = LocalRepository::new();
        let season = SeasonId(5);
        repo.store_matches(season, &inputs(3)).await.unwrap();
        repo.replace_rounds(season, &[round(season, 1, 1, 3)])
            .await
            .unwrap();

        assert_eq!(repo.delete_rounds(season).await.unwrap(), 1);
        assert!(repo
            .fetch_matches(season)
            .await
            .unwrap()
            .iter()
            .all(|m| m.round_id.is_none()));
        assert_eq!(repo.delete_rounds(season).await.unwrap(), 0);
    }
}
