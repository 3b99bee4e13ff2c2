//! Postgres repository implementation using Diesel.
//!
//! Matches and rounds live in two tables; `matches.round_id` references the
//! round a match was assigned to. Round replacement for a season runs in one
//! transaction guarded by `pg_advisory_xact_lock(season)`, so concurrent
//! recomputes of the same season serialize inside the database as well.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

use crate::db::repository::{
    validate_round_layout, ErrorContext, FixtureRepository, RepositoryError, RepositoryResult,
    RoundRepository,
};
use crate::models::{Match, MatchId, MatchInput, Round, RoundId, SeasonId, TeamId};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Rows per INSERT statement, well below the Postgres bind parameter limit.
const INSERT_CHUNK_SIZE: usize = 1000;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable pool settings fall back to [`PostgresConfig::default`].
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub connections_in_use: u32,
    pub idle_connections: u32,
    pub total_connections: u32,
    pub max_size: u32,
    pub total_queries: u64,
    pub failed_queries: u64,
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        log::info!(
            "Postgres repository ready (pool max={}, retries={})",
            config.max_pool_size,
            config.max_retries
        );

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// The closure runs on the blocking pool and is retried up to
    /// `max_retries` times with exponential backoff while the error it returns
    /// is retryable.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        log::warn!("Retrying after transient error: {}", e);
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

/// Serialize all writers of one season for the rest of the transaction.
fn lock_season(tx: &mut PgConnection, season: SeasonId) -> RepositoryResult<()> {
    sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(i64::from(season.0))
        .execute(tx)?;
    Ok(())
}

fn team_matches_to_json(team_matches: &BTreeMap<TeamId, u32>) -> Value {
    Value::Array(
        team_matches
            .iter()
            .map(|(team, count)| Value::Array(vec![Value::from(team.0), Value::from(*count)]))
            .collect(),
    )
}

fn json_to_team_matches(value: &Value) -> RepositoryResult<BTreeMap<TeamId, u32>> {
    let pairs: Vec<(i64, u32)> = serde_json::from_value(value.clone()).map_err(|e| {
        RepositoryError::internal(format!("Failed to parse team_matches_json: {}", e))
    })?;
    Ok(pairs
        .into_iter()
        .map(|(team, count)| (TeamId(team), count))
        .collect())
}

fn row_to_match(row: MatchRow) -> Match {
    Match {
        id: Some(MatchId(row.match_id)),
        season: SeasonId(row.season),
        sequence_number: row.sequence_number as u32,
        team_a: TeamId(row.team_a),
        team_b: TeamId(row.team_b),
        timestamp: row.played_at,
        round_id: row.round_id.map(RoundId),
    }
}

fn row_to_round(row: RoundRow) -> RepositoryResult<Round> {
    Ok(Round {
        id: Some(RoundId(row.round_id)),
        season: SeasonId(row.season),
        round_number: row.round_number as u32,
        first_match: row.first_match as u32,
        last_match: row.last_match as u32,
        matches_in_round: row.matches_in_round as u32,
        min_team_matches: row.min_team_matches as u32,
        max_team_matches: row.max_team_matches as u32,
        is_balanced: row.is_balanced,
        team_matches: json_to_team_matches(&row.team_matches_json)?,
        start_time: row.start_time,
        end_time: row.end_time,
        days_in_round: row.days_in_round,
    })
}

fn round_to_new_row(round: &Round) -> NewRoundRow {
    NewRoundRow {
        season: round.season.0,
        round_number: round.round_number as i32,
        first_match: round.first_match as i32,
        last_match: round.last_match as i32,
        matches_in_round: round.matches_in_round as i32,
        min_team_matches: round.min_team_matches as i32,
        max_team_matches: round.max_team_matches as i32,
        is_balanced: round.is_balanced,
        team_matches_json: team_matches_to_json(&round.team_matches),
        start_time: round.start_time,
        end_time: round.end_time,
        days_in_round: round.days_in_round,
    }
}

fn find_round_row(
    conn: &mut PgConnection,
    season: SeasonId,
    round_number: u32,
) -> RepositoryResult<RoundRow> {
    rounds::table
        .filter(rounds::season.eq(season.0))
        .filter(rounds::round_number.eq(round_number as i32))
        .select(RoundRow::as_select())
        .first::<RoundRow>(conn)
        .optional()?
        .ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("round {} not found", round_number),
                ErrorContext::new("get_round")
                    .with_entity("round")
                    .with_season(season)
                    .with_entity_id(round_number),
            )
        })
}

fn find_match_row(
    conn: &mut PgConnection,
    season: SeasonId,
    sequence_number: u32,
) -> RepositoryResult<MatchRow> {
    matches::table
        .filter(matches::season.eq(season.0))
        .filter(matches::sequence_number.eq(sequence_number as i32))
        .select(MatchRow::as_select())
        .first::<MatchRow>(conn)
        .optional()?
        .ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("match {} not found", sequence_number),
                ErrorContext::new("get_match")
                    .with_entity("match")
                    .with_season(season)
                    .with_entity_id(sequence_number),
            )
        })
}

#[async_trait]
impl FixtureRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| sql_query("SELECT 1").execute(conn).map(|_| true).map_err(Into::into))
            .await
    }

    async fn store_matches(
        &self,
        season: SeasonId,
        matches_in: &[MatchInput],
    ) -> RepositoryResult<usize> {
        let rows: Vec<NewMatchRow> = matches_in
            .iter()
            .map(|m| NewMatchRow {
                season: season.0,
                sequence_number: m.sequence_number as i32,
                team_a: m.team_a.0,
                team_b: m.team_b.0,
                played_at: m.timestamp,
            })
            .collect();

        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                lock_season(tx, season)?;

                diesel::delete(matches::table.filter(matches::season.eq(season.0))).execute(tx)?;
                diesel::delete(rounds::table.filter(rounds::season.eq(season.0))).execute(tx)?;

                let mut inserted = 0;
                for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
                    inserted += diesel::insert_into(matches::table)
                        .values(chunk)
                        .execute(tx)?;
                }
                Ok(inserted)
            })
            .map_err(|e| e.with_operation("store_matches").with_season(season))
        })
        .await
    }

    async fn fetch_matches(&self, season: SeasonId) -> RepositoryResult<Vec<Match>> {
        self.with_conn(move |conn| {
            let rows = matches::table
                .filter(matches::season.eq(season.0))
                .order(matches::sequence_number.asc())
                .select(MatchRow::as_select())
                .load::<MatchRow>(conn)?;
            Ok(rows.into_iter().map(row_to_match).collect())
        })
        .await
    }

    async fn get_match(&self, season: SeasonId, sequence_number: u32) -> RepositoryResult<Match> {
        self.with_conn(move |conn| {
            find_match_row(conn, season, sequence_number).map(row_to_match)
        })
        .await
    }

    async fn list_seasons(&self) -> RepositoryResult<Vec<SeasonId>> {
        self.with_conn(|conn| {
            let seasons: Vec<i32> = matches::table
                .select(matches::season)
                .distinct()
                .order(matches::season.asc())
                .load(conn)?;
            Ok(seasons.into_iter().map(SeasonId).collect())
        })
        .await
    }
}

#[async_trait]
impl RoundRepository for PostgresRepository {
    async fn replace_rounds(
        &self,
        season: SeasonId,
        new_rounds: &[Round],
    ) -> RepositoryResult<Vec<Round>> {
        let new_rounds = new_rounds.to_vec();

        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                lock_season(tx, season)?;

                let last_sequence: Option<i32> = matches::table
                    .filter(matches::season.eq(season.0))
                    .select(diesel::dsl::max(matches::sequence_number))
                    .first(tx)?;
                validate_round_layout(season, &new_rounds, last_sequence.unwrap_or(0) as u32)?;

                diesel::update(matches::table.filter(matches::season.eq(season.0)))
                    .set(matches::round_id.eq(None::<i64>))
                    .execute(tx)?;
                diesel::delete(rounds::table.filter(rounds::season.eq(season.0))).execute(tx)?;

                let rows: Vec<NewRoundRow> = new_rounds.iter().map(round_to_new_row).collect();
                let inserted: Vec<RoundRow> = diesel::insert_into(rounds::table)
                    .values(&rows)
                    .returning(RoundRow::as_returning())
                    .get_results(tx)?;

                for row in &inserted {
                    diesel::update(
                        matches::table
                            .filter(matches::season.eq(season.0))
                            .filter(matches::sequence_number.between(row.first_match, row.last_match)),
                    )
                    .set(matches::round_id.eq(Some(row.round_id)))
                    .execute(tx)?;
                }

                let mut stored = inserted
                    .into_iter()
                    .map(row_to_round)
                    .collect::<RepositoryResult<Vec<_>>>()?;
                stored.sort_by_key(|r| r.round_number);
                Ok(stored)
            })
            .map_err(|e| e.with_operation("replace_rounds").with_season(season))
        })
        .await
    }

    async fn fetch_rounds(&self, season: SeasonId) -> RepositoryResult<Vec<Round>> {
        self.with_conn(move |conn| {
            rounds::table
                .filter(rounds::season.eq(season.0))
                .order(rounds::round_number.asc())
                .select(RoundRow::as_select())
                .load::<RoundRow>(conn)?
                .into_iter()
                .map(row_to_round)
                .collect()
        })
        .await
    }

    async fn get_round(&self, season: SeasonId, round_number: u32) -> RepositoryResult<Round> {
        self.with_conn(move |conn| {
            find_round_row(conn, season, round_number).and_then(row_to_round)
        })
        .await
    }

    async fn round_for_match(
        &self,
        season: SeasonId,
        sequence_number: u32,
    ) -> RepositoryResult<Option<Round>> {
        self.with_conn(move |conn| {
            let m = find_match_row(conn, season, sequence_number)?;
            let Some(round_id) = m.round_id else {
                return Ok(None);
            };
            rounds::table
                .filter(rounds::round_id.eq(round_id))
                .select(RoundRow::as_select())
                .first::<RoundRow>(conn)
                .optional()?
                .map(row_to_round)
                .transpose()
        })
        .await
    }

    async fn matches_for_round(
        &self,
        season: SeasonId,
        round_number: u32,
    ) -> RepositoryResult<Vec<Match>> {
        self.with_conn(move |conn| {
            let round = find_round_row(conn, season, round_number)?;
            let rows = matches::table
                .filter(matches::round_id.eq(round.round_id))
                .order(matches::sequence_number.asc())
                .select(MatchRow::as_select())
                .load::<MatchRow>(conn)?;
            Ok(rows.into_iter().map(row_to_match).collect())
        })
        .await
    }

    async fn delete_rounds(&self, season: SeasonId) -> RepositoryResult<usize> {
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                lock_season(tx, season)?;
                diesel::update(matches::table.filter(matches::season.eq(season.0)))
                    .set(matches::round_id.eq(None::<i64>))
                    .execute(tx)?;
                let deleted =
                    diesel::delete(rounds::table.filter(rounds::season.eq(season.0))).execute(tx)?;
                Ok(deleted)
            })
        })
        .await
    }
}
