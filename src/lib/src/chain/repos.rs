//! Tracked-repository commit extraction.
//!
//! Target files in the authentication repository that track a git
//! repository carry the tracked commit id as JSON, e.g.
//! `{"commit": "abc123"}` under `targets/<path>`. Given a validated run
//! of authentication commits, these helpers recover, per tracked
//! repository, the sequence of commits it moved through. Commits where a
//! target file is missing or unparseable are tolerated and skipped; the
//! targets metadata is not updated on every authentication commit.

use crate::error::SealError;
use crate::git::{CommitId, GitReader};
use crate::metadata::{RoleName, TargetsRole};
use log::debug;
use std::collections::BTreeMap;

/// Directory of target files inside the authentication repository.
pub const TARGETS_DIR: &str = "targets";

/// For each authentication commit, the tracked commit id of every target
/// path that resolves to a repository pointer at that commit.
pub fn target_commits_at_commits(
    git: &dyn GitReader,
    commits: &[CommitId],
) -> Result<BTreeMap<CommitId, BTreeMap<String, CommitId>>, SealError> {
    let mut result = BTreeMap::new();

    for commit in commits {
        let mut tracked = BTreeMap::new();

        let targets_path = RoleName::Targets.metadata_path();
        let Some(bytes) = git.read_file(commit, &targets_path)? else {
            debug!("targets.json not available at revision {}", commit);
            result.insert(commit.clone(), tracked);
            continue;
        };
        let Ok(envelope) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            debug!("targets.json is not valid json at revision {}", commit);
            result.insert(commit.clone(), tracked);
            continue;
        };
        let Ok(targets) =
            serde_json::from_value::<TargetsRole>(envelope["signed"].clone())
        else {
            debug!("targets.json is not a targets document at revision {}", commit);
            result.insert(commit.clone(), tracked);
            continue;
        };

        for target_path in targets.targets.keys() {
            let file = format!("{}/{}", TARGETS_DIR, target_path);
            let Some(bytes) = git.read_file(commit, &file)? else {
                debug!(
                    "target file {} not available at revision {}",
                    target_path, commit
                );
                continue;
            };
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
                debug!(
                    "target file {} is not valid json at revision {}",
                    target_path, commit
                );
                continue;
            };
            let Some(tracked_commit) = value.get("commit").and_then(|c| c.as_str()) else {
                // Not a repository pointer.
                continue;
            };
            tracked.insert(target_path.clone(), CommitId::new(tracked_commit));
        }

        result.insert(commit.clone(), tracked);
    }

    Ok(result)
}

/// The sequence of commits each tracked repository moved through over the
/// given authentication commits, with consecutive repeats collapsed
/// (targets metadata is not updated on every authentication commit).
pub fn sorted_commits_per_repository(
    git: &dyn GitReader,
    commits: &[CommitId],
) -> Result<BTreeMap<String, Vec<CommitId>>, SealError> {
    let per_commit = target_commits_at_commits(git, commits)?;
    let mut sequences: BTreeMap<String, Vec<CommitId>> = BTreeMap::new();

    for commit in commits {
        let Some(tracked) = per_commit.get(commit) else {
            continue;
        };
        for (target_path, tracked_commit) in tracked {
            let sequence = sequences.entry(target_path.clone()).or_default();
            if sequence.last() != Some(tracked_commit) {
                sequence.push(tracked_commit.clone());
            }
        }
    }

    Ok(sequences)
}
