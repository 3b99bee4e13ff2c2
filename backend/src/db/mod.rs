//! Storage for match ledgers and computed rounds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  RoundPlanner / CLI                                     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/)                        │
//! │  FixtureRepository + RoundRepository = FullRepository   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │ LocalRepository  │  Postgres │
//!     │   (in-memory)    │  (Diesel) │
//!     └──────────────────────────────┘
//! ```
//!
//! # Recommended Usage
//!
//! ```ignore
//! use fantasy_rounds::db::{services, RepositoryFactory};
//! use fantasy_rounds::models::SeasonId;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!     let rounds = services::list_rounds(repo.as_ref(), SeasonId(2024)).await?;
//!     Ok(())
//! }
//! ```

// Feature flag priority: postgres > local
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod checksum;
pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    _private: (),
}

pub use services::{
    fetch_ledger, get_round, health_check, list_rounds, list_seasons, matches_for_round,
    round_for_match, store_ledger,
};

pub use checksum::{calculate_checksum, calculate_ledger_checksum};
pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repo_config::{RepositoryConfig, RoundSettings};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FixtureRepository, FullRepository, RepositoryError, RepositoryResult,
    RoundRepository,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Initialize the global repository singleton from the environment.
///
/// Later calls are no-ops once a repository is installed.
pub async fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::from_env()
        .await
        .map_err(|e| anyhow::Error::msg(e.to_string()))
        .context("Failed to initialize repository")?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
