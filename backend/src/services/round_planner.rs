//! Round recomputation service.
//!
//! [`RoundPlanner`] ties the engine to a repository: it loads a season's
//! ledger, runs [`plan_rounds`] and persists the result through
//! [`RoundRepository::replace_rounds`](crate::db::RoundRepository::replace_rounds).
//! Recomputes of the same season are serialized by an async per-season lock;
//! different seasons proceed independently.

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::algorithms::{plan_rounds, EngineResult, RoundParameters, RoundPlan};
use crate::db::checksum::calculate_ledger_checksum;
use crate::db::repository::FullRepository;
use crate::models::{Round, SeasonId};

/// Result of a persisted recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub season: SeasonId,
    pub rounds_created: usize,
    pub boundaries: Vec<u32>,
    /// Fingerprint of the ledger and parameters the rounds were computed from.
    pub ledger_checksum: String,
    /// Stored rounds, with repository ids.
    pub rounds: Vec<Round>,
}

/// Computes and stores the rounds of a season.
pub struct RoundPlanner<R: FullRepository + ?Sized = dyn FullRepository> {
    repo: Arc<R>,
    defaults: RoundParameters,
    season_locks: Mutex<HashMap<SeasonId, Arc<AsyncMutex<()>>>>,
}

impl<R: FullRepository + ?Sized> RoundPlanner<R> {
    /// Create a planner using [`RoundParameters::default`].
    pub fn new(repo: Arc<R>) -> Self {
        Self::with_parameters(repo, RoundParameters::default())
    }

    pub fn with_parameters(repo: Arc<R>, defaults: RoundParameters) -> Self {
        Self {
            repo,
            defaults,
            season_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn parameters(&self) -> RoundParameters {
        self.defaults
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    fn season_lock(&self, season: SeasonId) -> Arc<AsyncMutex<()>> {
        self.season_locks
            .lock()
            .entry(season)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop `lock` and forget the season's entry if no other task holds or awaits it.
    fn release_season_lock(&self, season: SeasonId, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.season_locks.lock();
        drop(lock);
        if locks
            .get(&season)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&season);
        }
    }

    /// Recompute and store the rounds of `season` with the default parameters.
    pub async fn recompute(&self, season: SeasonId) -> EngineResult<RecomputeOutcome> {
        self.recompute_with(season, self.defaults).await
    }

    /// Recompute and store the rounds of `season`.
    ///
    /// Either every round of the season is replaced or, on failure, the
    /// previously stored rounds stay in place.
    pub async fn recompute_with(
        &self,
        season: SeasonId,
        params: RoundParameters,
    ) -> EngineResult<RecomputeOutcome> {
        let result = self.run_recompute(season, params).await;
        if let Err(ref e) = result {
            error!(
                "Round recompute failed for season {} (tolerance={}, spacing={}, max_rounds={}): {}",
                season, params.tolerance, params.spacing, params.max_rounds, e
            );
        }
        result
    }

    async fn run_recompute(
        &self,
        season: SeasonId,
        params: RoundParameters,
    ) -> EngineResult<RecomputeOutcome> {
        params.validate()?;

        let lock = self.season_lock(season);
        let result = {
            let _guard = lock.lock().await;
            self.recompute_locked(season, params).await
        };
        self.release_season_lock(season, lock);
        result
    }

    async fn recompute_locked(
        &self,
        season: SeasonId,
        params: RoundParameters,
    ) -> EngineResult<RecomputeOutcome> {
        info!(
            "Recomputing rounds for season {} (tolerance={}, spacing={}, max_rounds={})",
            season, params.tolerance, params.spacing, params.max_rounds
        );

        let ledger = self.repo.fetch_matches(season).await?;
        let plan = plan_rounds(season, &ledger, &params)?;
        plan.verify_coverage(&ledger)?;
        let ledger_checksum = calculate_ledger_checksum(&ledger, &params);

        let stored = match self.repo.replace_rounds(season, &plan.rounds).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    "Round write for season {} rolled back, previous rounds kept",
                    season
                );
                return Err(e.into());
            }
        };

        info!(
            "Stored {} rounds for season {} (boundaries {:?}, checksum {})",
            stored.len(),
            season,
            plan.boundaries(),
            ledger_checksum
        );

        Ok(RecomputeOutcome {
            season,
            rounds_created: stored.len(),
            boundaries: plan.boundaries().to_vec(),
            ledger_checksum,
            rounds: stored,
        })
    }

    /// Compute the rounds of `season` with the default parameters, without
    /// writing anything.
    pub async fn preview(&self, season: SeasonId) -> EngineResult<RoundPlan> {
        self.preview_with(season, self.defaults).await
    }

    /// Compute the rounds of `season` without writing anything.
    ///
    /// Runs the same pipeline as [`recompute_with`](Self::recompute_with), so a
    /// preview matches what a recompute would store.
    pub async fn preview_with(
        &self,
        season: SeasonId,
        params: RoundParameters,
    ) -> EngineResult<RoundPlan> {
        params.validate()?;
        let ledger = self.repo.fetch_matches(season).await?;
        plan_rounds(season, &ledger, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::RoundEngineError;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::{FixtureRepository, RoundRepository};
    use crate::models::{MatchInput, TeamId};
    use chrono::{Duration, TimeZone, Utc};

    async fn seeded(season: SeasonId, n: u32) -> Arc<LocalRepository> {
        let repo = Arc::new(LocalRepository::new());
        let start = Utc.with_ymd_and_hms(2024, 3, 22, 19, 30, 0).unwrap();
        let pairs = [(1, 2), (3, 4), (1, 3), (2, 4), (1, 4), (2, 3)];
        let ledger: Vec<MatchInput> = (0..n)
            .map(|i| {
                let (a, b) = pairs[i as usize % pairs.len()];
                MatchInput {
                    sequence_number: i + 1,
                    team_a: TeamId(a),
                    team_b: TeamId(b),
                    timestamp: start + Duration::days(i64::from(i)),
                }
            })
            .collect();
        repo.store_matches(season, &ledger).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_recompute_persists_rounds() {
        let season = SeasonId(2024);
        let repo = seeded(season, 24).await;
        let planner = RoundPlanner::new(repo.clone());

        let outcome = planner.recompute(season).await.unwrap();
        assert_eq!(outcome.boundaries.last(), Some(&24));
        assert_eq!(outcome.rounds_created, outcome.boundaries.len());
        assert_eq!(repo.fetch_rounds(season).await.unwrap(), outcome.rounds);
        assert_eq!(outcome.ledger_checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_preview_matches_recompute() {
        let season = SeasonId(2024);
        let repo = seeded(season, 30).await;
        let planner = RoundPlanner::new(repo.clone());

        let preview = planner.preview(season).await.unwrap();
        assert!(repo.fetch_rounds(season).await.unwrap().is_empty());

        let outcome = planner.recompute(season).await.unwrap();
        assert_eq!(preview.boundaries(), outcome.boundaries.as_slice());
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected_before_reading() {
        let repo = Arc::new(LocalRepository::new());
        repo.set_healthy(false);
        let planner = RoundPlanner::new(repo);
        let bad = RoundParameters::default().with_spacing(1);

        let err = planner.recompute_with(SeasonId(1), bad).await.unwrap_err();
        assert!(matches!(err, RoundEngineError::ParameterError(_)));
    }

    #[tokio::test]
    async fn test_season_lock_entries_are_released() {
        let season = SeasonId(2024);
        let planner = Arc::new(RoundPlanner::new(seeded(season, 24).await));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let planner = Arc::clone(&planner);
                tokio::spawn(async move { planner.recompute(season).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(planner.season_locks.lock().is_empty());

        assert!(planner.recompute(SeasonId(99)).await.is_err());
        assert!(planner.season_locks.lock().is_empty());
    }

    #[test]
    fn test_season_lock_kept_while_another_task_holds_it() {
        let planner = RoundPlanner::new(Arc::new(LocalRepository::new()));
        let season = SeasonId(7);
        let first = planner.season_lock(season);
        let second = planner.season_lock(season);
        assert!(Arc::ptr_eq(&first, &second));

        planner.release_season_lock(season, first);
        assert!(planner.season_locks.lock().contains_key(&season));

        planner.release_season_lock(season, second);
        assert!(planner.season_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_season_is_insufficient_data() {
        let planner = RoundPlanner::new(Arc::new(LocalRepository::new()));
        let err = planner.recompute(SeasonId(99)).await.unwrap_err();
        assert!(matches!(err, RoundEngineError::InsufficientData { .. }));
    }
}
