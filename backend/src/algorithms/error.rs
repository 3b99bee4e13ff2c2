//! Error taxonomy for the round partitioning engine.

use crate::db::repository::RepositoryError;
use crate::models::SeasonId;

/// Result type for engine and planner operations
pub type EngineResult<T> = Result<T, RoundEngineError>;

/// Errors raised while computing or persisting a season's rounds.
#[derive(Debug, thiserror::Error)]
pub enum RoundEngineError {
    /// The ledger holds no matches (or no teams) to score.
    #[error("Insufficient data for season {season}: {message}")]
    InsufficientData { season: SeasonId, message: String },

    /// A tunable parameter is outside its accepted range. Raised before any work starts.
    #[error("Invalid parameter: {0}")]
    ParameterError(String),

    /// The ledger breaks a structural invariant (gaps, duplicates, self-matches).
    #[error("Invalid ledger for season {season}: {message}")]
    InvalidLedger { season: SeasonId, message: String },

    /// The computed boundaries or rounds do not partition the season.
    #[error("Coverage violation for season {season}: {message}")]
    CoverageViolation { season: SeasonId, message: String },

    /// The atomic round write failed and was rolled back.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] RepositoryError),
}

impl RoundEngineError {
    pub fn insufficient_data(season: SeasonId, message: impl Into<String>) -> Self {
        Self::InsufficientData {
            season,
            message: message.into(),
        }
    }

    pub fn invalid_ledger(season: SeasonId, message: impl Into<String>) -> Self {
        Self::InvalidLedger {
            season,
            message: message.into(),
        }
    }

    pub fn coverage(season: SeasonId, message: impl Into<String>) -> Self {
        Self::CoverageViolation {
            season,
            message: message.into(),
        }
    }

    /// Only storage failures are worth retrying; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PersistenceFailure(e) => e.is_retryable(),
            _ => false,
        }
    }
}
