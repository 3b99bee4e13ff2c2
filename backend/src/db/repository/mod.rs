//! Repository traits for fixture and round persistence.
//!
//! Storage is split by concern:
//! - [`FixtureRepository`]: the match ledger of each season
//! - [`RoundRepository`]: materialized rounds and match-to-round assignment
//!
//! [`FullRepository`] is implemented for anything providing both, so services
//! can take a single `Arc<dyn FullRepository>`.

pub mod error;
pub mod fixtures;
pub mod rounds;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use fixtures::FixtureRepository;
pub use rounds::{validate_round_layout, RoundRepository};

/// Combined repository used by the round planner and the service layer.
pub trait FullRepository: FixtureRepository + RoundRepository {}

impl<T> FullRepository for T where T: FixtureRepository + RoundRepository {}
