//! Shared helpers for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use fantasy_rounds::db::{FixtureRepository, LocalRepository};
use fantasy_rounds::models::{Match, MatchInput, SeasonId, TeamId};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the variables on unwind and serializes access to the process
/// environment across tests running in parallel.
///
/// `changes` is a list of `(key, value)` pairs: `Some(v)` sets the variable,
/// `None` removes it.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub fn season_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 22, 14, 0, 0).unwrap()
}

/// One match per day from [`season_start`], numbered from 1.
pub fn inputs_from_pairs(pairs: &[(i64, i64)]) -> Vec<MatchInput> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, &(a, b))| MatchInput {
            sequence_number: i as u32 + 1,
            team_a: TeamId(a),
            team_b: TeamId(b),
            timestamp: season_start() + Duration::days(i as i64),
        })
        .collect()
}

pub fn matches_from_pairs(season: SeasonId, pairs: &[(i64, i64)]) -> Vec<Match> {
    inputs_from_pairs(pairs)
        .into_iter()
        .map(|input| input.into_match(season))
        .collect()
}

/// Two teams meeting `n` times, home side alternating.
pub fn alternating_pairs(n: usize) -> Vec<(i64, i64)> {
    (0..n)
        .map(|i| if i % 2 == 0 { (1, 2) } else { (2, 1) })
        .collect()
}

/// Balanced round robin (circle method) repeated `legs` times; `teams` must be even.
pub fn round_robin_pairs(teams: i64, legs: usize) -> Vec<(i64, i64)> {
    let n = teams as usize;
    let mut ids: Vec<i64> = (1..=teams).collect();
    let mut one_leg = Vec::new();
    for _ in 0..n - 1 {
        for i in 0..n / 2 {
            one_leg.push((ids[i], ids[n - 1 - i]));
        }
        let moved = ids.pop().unwrap();
        ids.insert(1, moved);
    }
    (0..legs).flat_map(|_| one_leg.clone()).collect()
}

/// Every pairing in lexicographic order, repeated `legs` times. Low-numbered
/// teams play most of their matches early in each leg.
pub fn front_loaded_pairs(teams: i64, legs: usize) -> Vec<(i64, i64)> {
    let mut one_leg = Vec::new();
    for a in 1..=teams {
        for b in (a + 1)..=teams {
            one_leg.push((a, b));
        }
    }
    (0..legs).flat_map(|_| one_leg.clone()).collect()
}

pub async fn seeded_repository(season: SeasonId, pairs: &[(i64, i64)]) -> Arc<LocalRepository> {
    let repo = Arc::new(LocalRepository::new());
    repo.store_matches(season, &inputs_from_pairs(pairs))
        .await
        .unwrap();
    repo
}
