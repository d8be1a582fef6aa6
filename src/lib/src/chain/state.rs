//! Immutable per-commit trust state.

use crate::error::SealError;
use crate::git::{CommitId, GitReader};
use crate::metadata::{MetadataSet, RootRole};
use std::collections::BTreeMap;

/// The trust established by the last fully validated commit.
///
/// A `TrustState` is a value, not a place: each successful commit produces
/// a fresh one and the previous is dropped. It carries everything the next
/// commit's verification depends on: the validated root (key sets,
/// thresholds, version and raw bytes) and the last validated version of
/// every non-root role. Only the watermark it names is persisted.
#[derive(Debug, Clone)]
pub struct TrustState {
    root: RootRole,
    root_raw: Vec<u8>,
    role_versions: BTreeMap<String, u64>,
    watermark: CommitId,
}

impl TrustState {
    /// Capture the trust state of a commit whose metadata set has passed
    /// every check.
    pub fn from_validated(watermark: CommitId, set: &MetadataSet) -> Self {
        let mut role_versions = BTreeMap::new();
        role_versions.insert("targets".to_string(), set.targets.version().get());
        role_versions.insert("snapshot".to_string(), set.snapshot.version().get());
        role_versions.insert("timestamp".to_string(), set.timestamp.version().get());
        for (name, doc) in &set.delegated {
            role_versions.insert(name.clone(), doc.version().get());
        }

        TrustState {
            root: set.root.signed.clone(),
            root_raw: set.root.raw_bytes().to_vec(),
            role_versions,
            watermark,
        }
    }

    /// Rebuild the trust state at a previously validated commit.
    ///
    /// Used at startup to resume from a persisted watermark: the commit
    /// passed full validation in an earlier run, so its metadata is
    /// structure-checked but not re-verified.
    pub fn at_commit(git: &dyn GitReader, commit: &CommitId) -> Result<Self, SealError> {
        let set = MetadataSet::load(git, commit)?;
        Ok(Self::from_validated(commit.clone(), &set))
    }

    /// The validated root role.
    pub fn root(&self) -> &RootRole {
        &self.root
    }

    /// Raw bytes of the validated root document, for the byte-identical
    /// rule when a successor commit carries the same root version.
    pub fn root_raw(&self) -> &[u8] {
        &self.root_raw
    }

    /// The commit this state was captured at.
    pub fn watermark(&self) -> &CommitId {
        &self.watermark
    }

    /// Last validated version of a non-root role, if the role existed.
    pub fn version_of(&self, role: &str) -> Option<u64> {
        self.role_versions.get(role).copied()
    }
}
