//! Typed role metadata: keys, roles, delegations, signed envelopes, and
//! the per-commit snapshot loader.
//!
//! Everything here is pure data plus structure checks. Trust decisions
//! (signatures, thresholds, version monotonicity, expiration, content) are
//! made by [`crate::verify`] and [`crate::chain`].

mod document;
mod keys;
mod loader;
mod role;

pub use document::*;
pub use keys::*;
pub use loader::*;
pub use role::*;
