//! # Fantasy Rounds
//!
//! Balanced round partitioning for a fantasy-cricket league.
//!
//! Given the ordered matches of a season, the engine splits them into a small
//! number of contiguous rounds so that, at the end of each round, every team
//! has played an approximately equal number of matches, while round
//! boundaries stay roughly evenly spaced. Rounds are persisted and every match
//! is linked to the round that contains it, so downstream features (transfer
//! windows, scoring periods) can ask which round a match belongs to.
//!
//! ## Architecture
//!
//! - [`models`]: matches, rounds and their identifiers
//! - [`algorithms`]: the pure engine (participation, scoring, selection,
//!   materialization)
//! - [`db`]: repository traits, in-memory and Postgres stores, configuration
//! - [`services`]: recompute/preview orchestration and reporting

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod algorithms;
pub mod db;
pub mod models;
pub mod services;

pub use algorithms::{plan_rounds, RoundEngineError, RoundParameters, RoundPlan};
pub use models::{Match, MatchInput, Round, SeasonId, TeamId};
pub use services::{RecomputeOutcome, RoundPlanner};
