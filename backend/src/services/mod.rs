//! Orchestration on top of the engine and the repositories.
//!
//! - [`round_planner`]: recompute and preview a season's rounds
//! - [`report`]: summary statistics for a round layout

pub mod report;
pub mod round_planner;

pub use report::{summarize_plan, RoundPlanSummary};
pub use round_planner::{RecomputeOutcome, RoundPlanner};
