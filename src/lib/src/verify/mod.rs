//! Signature, delegation and target-content verification.
//!
//! These are the per-document checks the trust-chain state machine
//! composes: threshold signature verification, delegation-tree resolution
//! with cycle detection, and declared-versus-actual target content
//! comparison.

pub mod delegation;
pub mod signature;
pub mod targets;

pub use delegation::{path_matches, reachable_roles, resolve, ReachableRole, RoleStep};
pub use signature::{verify_document, verify_signatures};
pub use targets::{collect_entries, verify_targets};
