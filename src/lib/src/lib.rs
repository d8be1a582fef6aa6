//! Authenticate the state of a collection of git repositories using a
//! chain of signed role metadata stored in a dedicated authentication
//! repository.
//!
//! The core is the incremental trust-chain validator: walk the
//! authentication repository's commit history, reconstruct the
//! signed-metadata state at each commit, verify signatures against a
//! role/threshold/delegation model, reject rollback and expiration
//! attacks, confirm that tracked content matches what trusted metadata
//! declares, and advance a persisted watermark only when every invariant
//! holds.
//!
//! # Trust model
//!
//! 1. **Root** establishes the key sets and thresholds for all top-level
//!    roles; each new root must be signed by the previously validated one.
//! 2. **Targets** declares the trusted target files and may delegate
//!    authority over path patterns to nested roles.
//! 3. **Snapshot** pins the version of every other metadata document,
//!    preventing mix-and-match replay.
//! 4. **Timestamp** bounds the freshness of the snapshot.
//!
//! Validation is read-only. Producing new signed metadata is the separate
//! authoring path in [`signing`], which takes the hardware-token
//! capability as an explicit handle.
//!
//! # Example
//!
//! ```rust,ignore
//! use gitseal::{ChainValidator, FileWatermarkStore, ValidationOutcome};
//!
//! let store = FileWatermarkStore::new("validated-commits.json");
//! let mut validator = ChainValidator::new("law-auth", &git, &content, &store);
//! match validator.run()? {
//!     ValidationOutcome::AllCommitsValidated { watermark } => { /* trusted */ }
//!     ValidationOutcome::FailedAt { commit, reason } => { /* halt and alert */ }
//! }
//! ```

#![forbid(unsafe_code)]

mod canonical;
mod error;
mod git;
mod store;

pub mod chain;
pub mod metadata;
pub mod signing;
pub mod time;
pub mod verify;

pub use canonical::*;
pub use chain::*;
pub use error::*;
pub use git::*;
pub use store::*;

pub mod reexports {
    pub use {anyhow, ct_codecs, hmac_sha256, log, thiserror};
}
