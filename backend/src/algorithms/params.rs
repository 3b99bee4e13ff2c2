//! Tunable parameters of the boundary search.

use serde::{Deserialize, Serialize};

use super::error::{EngineResult, RoundEngineError};

/// Default acceptable spread between least- and most-active team.
pub const DEFAULT_TOLERANCE: u32 = 1;
/// Default target gap between consecutive boundaries.
pub const DEFAULT_SPACING: u32 = 7;
/// Default cap on selected boundaries.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
/// Smallest spacing the selector can work with.
pub const MIN_SPACING: u32 = 3;

/// Validated parameters for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundParameters {
    pub tolerance: u32,
    pub spacing: u32,
    pub max_rounds: u32,
}

impl Default for RoundParameters {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            spacing: DEFAULT_SPACING,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl RoundParameters {
    /// Build parameters from raw (possibly negative) values, as read from
    /// configuration files, environment variables or the command line.
    pub fn try_new(tolerance: i64, spacing: i64, max_rounds: i64) -> EngineResult<Self> {
        let tolerance = u32::try_from(tolerance).map_err(|_| {
            RoundEngineError::ParameterError(format!(
                "tolerance must be a non-negative integer, got {}",
                tolerance
            ))
        })?;
        let spacing = u32::try_from(spacing).map_err(|_| {
            RoundEngineError::ParameterError(format!(
                "spacing must be a positive integer, got {}",
                spacing
            ))
        })?;
        let max_rounds = u32::try_from(max_rounds).map_err(|_| {
            RoundEngineError::ParameterError(format!(
                "max_rounds must be a positive integer, got {}",
                max_rounds
            ))
        })?;

        let params = Self {
            tolerance,
            spacing,
            max_rounds,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the ranges the selector relies on.
    pub fn validate(&self) -> EngineResult<()> {
        if self.spacing < MIN_SPACING {
            return Err(RoundEngineError::ParameterError(format!(
                "spacing must be at least {}, got {}",
                MIN_SPACING, self.spacing
            )));
        }
        if self.max_rounds == 0 {
            return Err(RoundEngineError::ParameterError(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_spacing(mut self, spacing: u32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}
