//! The incremental trust-chain validator.
//!
//! [`ChainValidator`] consumes an ordered sequence of commits and advances
//! a persisted watermark only when every invariant holds: structural
//! well-formedness, root continuity, thresholds, version monotonicity,
//! freshness, delegation consistency and target content. The supporting
//! pieces are the immutable [`TrustState`] threaded between commits and
//! the tracked-repository commit extraction in [`repos`].

mod config;
mod machine;
pub mod repos;
mod state;

pub use config::{ExpiryBehavior, ValidatorConfig};
pub use machine::{ChainValidator, ValidationOutcome, ValidatorState};
pub use state::TrustState;
