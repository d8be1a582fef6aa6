//! Validated-commit store.
//!
//! Persists the watermark, the last commit known to have passed full
//! validation, between runs, keyed by authentication repository. The
//! store is written only after every per-commit check has passed, never
//! before, so a crash mid-walk loses at most the in-progress commit.

use crate::error::SealError;
use crate::git::CommitId;
use log::debug;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Persistence for `{authentication repository -> last validated commit}`.
///
/// `load` returning `None` means "validate from genesis". `save` must be
/// transactional: after a crash, either the previous watermark or the new
/// one is read back, never a torn record.
pub trait WatermarkStore: Send + Sync {
    /// Last validated commit for `auth_repo`, if any.
    fn load(&self, auth_repo: &str) -> Result<Option<CommitId>, SealError>;

    /// Record `commit` as the last validated commit for `auth_repo`.
    fn save(&self, auth_repo: &str, commit: &CommitId) -> Result<(), SealError>;
}

/// In-memory store for tests and single-run validation.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    marks: RwLock<BTreeMap<String, CommitId>>,
}

impl MemoryWatermarkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one pre-recorded watermark.
    pub fn with_watermark(auth_repo: &str, commit: CommitId) -> Self {
        let store = Self::new();
        let mut marks = store
            .marks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        marks.insert(auth_repo.to_string(), commit);
        drop(marks);
        store
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self, auth_repo: &str) -> Result<Option<CommitId>, SealError> {
        let marks = self
            .marks
            .read()
            .map_err(|_| SealError::Internal("watermark lock poisoned".to_string()))?;
        Ok(marks.get(auth_repo).cloned())
    }

    fn save(&self, auth_repo: &str, commit: &CommitId) -> Result<(), SealError> {
        let mut marks = self
            .marks
            .write()
            .map_err(|_| SealError::Internal("watermark lock poisoned".to_string()))?;
        marks.insert(auth_repo.to_string(), commit.clone());
        Ok(())
    }
}

/// File-backed store: a JSON map on disk, overwritten atomically.
///
/// Writes go to a temporary sibling file which is renamed over the
/// original, so a crash during `save` leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<BTreeMap<String, CommitId>, SealError> {
        match std::fs::read(&self.path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                SealError::Internal(format!("corrupt watermark store: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self, auth_repo: &str) -> Result<Option<CommitId>, SealError> {
        Ok(self.read_map()?.get(auth_repo).cloned())
    }

    fn save(&self, auth_repo: &str, commit: &CommitId) -> Result<(), SealError> {
        let mut marks = self.read_map()?;
        marks.insert(auth_repo.to_string(), commit.clone());

        let data = serde_json::to_vec_pretty(&marks)
            .map_err(|e| SealError::Internal(format!("watermark serialization: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("watermark for {} advanced to {}", auth_repo, commit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryWatermarkStore::new();
        assert!(store.load("auth").unwrap().is_none());

        store.save("auth", &CommitId::new("c7")).unwrap();
        assert_eq!(store.load("auth").unwrap(), Some(CommitId::new("c7")));

        // Overwrite on advance.
        store.save("auth", &CommitId::new("c8")).unwrap();
        assert_eq!(store.load("auth").unwrap(), Some(CommitId::new("c8")));

        // Independent repositories are independent records.
        assert!(store.load("other").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_with_watermark() {
        let store = MemoryWatermarkStore::with_watermark("auth", CommitId::new("c3"));
        assert_eq!(store.load("auth").unwrap(), Some(CommitId::new("c3")));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let path = std::env::temp_dir().join("gitseal-watermark-test.json");
        std::fs::remove_file(&path).ok();

        let store = FileWatermarkStore::new(&path);
        assert!(store.load("auth").unwrap().is_none());

        store.save("auth", &CommitId::new("abc123")).unwrap();
        store.save("other", &CommitId::new("def456")).unwrap();

        // A fresh handle reads the same records back.
        let reopened = FileWatermarkStore::new(&path);
        assert_eq!(
            reopened.load("auth").unwrap(),
            Some(CommitId::new("abc123"))
        );
        assert_eq!(
            reopened.load("other").unwrap(),
            Some(CommitId::new("def456"))
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_file_store_missing_file_means_genesis() {
        let path = std::env::temp_dir().join("gitseal-watermark-absent.json");
        std::fs::remove_file(&path).ok();

        let store = FileWatermarkStore::new(&path);
        assert!(store.load("auth").unwrap().is_none());
    }
}
