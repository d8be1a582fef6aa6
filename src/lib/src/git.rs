//! Git and repository-content collaborators.
//!
//! The validator never touches a repository directly. All commit and
//! content reads go through the traits below, so the same validation code
//! works against a real git binding, a server-side object store, or the
//! in-memory implementations used by tests and harnesses. Collaborator
//! failures are transient [`SealError::Collaborator`] values, distinct from
//! trust failures: the caller may retry the same call, since the validator
//! persists nothing before a commit fully validates.

use crate::error::SealError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a commit in the authentication repository.
///
/// Ordering between commits is supplied by [`GitReader::commits_since`],
/// never derived from the identifier itself.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Create a commit identifier from its textual form.
    pub fn new(id: impl Into<String>) -> Self {
        CommitId(id.into())
    }

    /// The textual form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.0)
    }
}

impl From<&str> for CommitId {
    fn from(id: &str) -> Self {
        CommitId::new(id)
    }
}

/// Read access to the authentication repository's history.
///
/// Implementations wrap whatever git plumbing is available (a subprocess, a
/// libgit2 binding, a hosted API). All methods are synchronous; timeouts
/// and cancellation are the implementation's responsibility.
pub trait GitReader: Send + Sync {
    /// Commits strictly after `watermark`, ancestor to descendant
    /// (first-parent order). `None` means the full history from genesis.
    fn commits_since(&self, watermark: Option<&CommitId>) -> Result<Vec<CommitId>, SealError>;

    /// Raw bytes of `path` in the repository tree at `commit`, or `None`
    /// if the path does not exist at that commit.
    fn read_file(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>, SealError>;

    /// Reference time of `commit` (Unix seconds, typically the commit
    /// time). Expiration checks use this instead of wall-clock time so
    /// that validation is deterministic and replayable.
    fn reference_time(&self, commit: &CommitId) -> Result<u64, SealError>;
}

/// Read access to tracked-repository content for target verification.
pub trait RepoContentReader: Send + Sync {
    /// Length and SHA-256 of the content at `path` as tracked by `repo` at
    /// `commit`, or `None` if no such content exists. `path` is the target
    /// path exactly as declared by the targets role; implementations
    /// resolve it inside the tracked tree.
    fn content_hash(
        &self,
        repo: &str,
        commit: &CommitId,
        path: &str,
    ) -> Result<Option<(u64, [u8; 32])>, SealError>;
}

/// In-memory git reader for tests and harnesses.
///
/// Commits are held in insertion order; files are keyed by commit and path.
#[derive(Debug, Default, Clone)]
pub struct MemoryGitReader {
    commits: Vec<CommitId>,
    times: BTreeMap<CommitId, u64>,
    files: BTreeMap<(CommitId, String), Vec<u8>>,
}

impl MemoryGitReader {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit with the given reference time.
    pub fn add_commit(&mut self, id: impl Into<CommitId>, reference_time: u64) {
        let id = id.into();
        self.times.insert(id.clone(), reference_time);
        self.commits.push(id);
    }

    /// Place file bytes at `path` for `commit`.
    pub fn add_file(&mut self, commit: impl Into<CommitId>, path: &str, bytes: Vec<u8>) {
        self.files.insert((commit.into(), path.to_string()), bytes);
    }
}

impl GitReader for MemoryGitReader {
    fn commits_since(&self, watermark: Option<&CommitId>) -> Result<Vec<CommitId>, SealError> {
        match watermark {
            None => Ok(self.commits.clone()),
            Some(w) => {
                let pos = self.commits.iter().position(|c| c == w).ok_or_else(|| {
                    SealError::Collaborator(format!("unknown watermark commit {}", w))
                })?;
                Ok(self.commits[pos + 1..].to_vec())
            }
        }
    }

    fn read_file(&self, commit: &CommitId, path: &str) -> Result<Option<Vec<u8>>, SealError> {
        if !self.times.contains_key(commit) {
            return Err(SealError::Collaborator(format!(
                "unknown commit {}",
                commit
            )));
        }
        Ok(self
            .files
            .get(&(commit.clone(), path.to_string()))
            .cloned())
    }

    fn reference_time(&self, commit: &CommitId) -> Result<u64, SealError> {
        self.times
            .get(commit)
            .copied()
            .ok_or_else(|| SealError::Collaborator(format!("unknown commit {}", commit)))
    }
}

/// In-memory content reader for tests and harnesses.
#[derive(Debug, Default, Clone)]
pub struct MemoryContentReader {
    entries: BTreeMap<(String, CommitId, String), (u64, [u8; 32])>,
}

impl MemoryContentReader {
    /// Create an empty content store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the content `(length, sha256)` of `path` in `repo` at
    /// `commit`.
    pub fn add_content(
        &mut self,
        repo: &str,
        commit: impl Into<CommitId>,
        path: &str,
        length: u64,
        sha256: [u8; 32],
    ) {
        self.entries.insert(
            (repo.to_string(), commit.into(), path.to_string()),
            (length, sha256),
        );
    }
}

impl RepoContentReader for MemoryContentReader {
    fn content_hash(
        &self,
        repo: &str,
        commit: &CommitId,
        path: &str,
    ) -> Result<Option<(u64, [u8; 32])>, SealError> {
        Ok(self
            .entries
            .get(&(repo.to_string(), commit.clone(), path.to_string()))
            .copied())
    }
}
