//! Target content verification.
//!
//! Compares the length and hash every reachable target entry declares
//! against the actual tracked-repository content reported by the
//! repository-content collaborator.

use crate::error::SealError;
use crate::git::{CommitId, RepoContentReader};
use crate::metadata::{MetadataSet, TargetEntry};
use crate::verify::delegation::{path_matches, reachable_roles};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Every target entry reachable from validated targets and delegated
/// roles, keyed by target path, with the declaring role's name.
///
/// The top-level targets role declares first; delegated roles follow in
/// declared reach order, and the first declaration of a path wins. An
/// entry a delegated role declares outside its delegated path patterns
/// (including every ancestor edge's patterns) is not trusted and is
/// skipped with a warning.
pub fn collect_entries<'a>(
    set: &'a MetadataSet,
    max_depth: usize,
) -> Result<BTreeMap<&'a str, (&'a str, &'a TargetEntry)>, SealError> {
    let mut entries: BTreeMap<&'a str, (&'a str, &'a TargetEntry)> = BTreeMap::new();

    for (path, entry) in &set.targets.signed.targets {
        entries.insert(path.as_str(), ("targets", entry));
    }

    for role in reachable_roles(set, max_depth)? {
        let doc = set
            .delegated_doc(role.name)
            .ok_or_else(|| SealError::MissingRole {
                role: role.name.to_string(),
            })?;
        for (path, entry) in &doc.signed.targets {
            let authorized = role
                .path_chain
                .iter()
                .all(|patterns| patterns.iter().any(|p| path_matches(p, path)));
            if !authorized {
                warn!(
                    "role {} declares target {} outside its delegated paths; ignoring",
                    role.name, path
                );
                continue;
            }
            entries.entry(path.as_str()).or_insert((role.name, entry));
        }
    }

    Ok(entries)
}

/// Verify actual content against every reachable declared target entry.
///
/// Returns the number of verified targets. The first mismatch fails with
/// [`SealError::TargetContentMismatch`]; declared targets with no
/// corresponding content fail with [`SealError::MissingTargetContent`].
pub fn verify_targets(
    set: &MetadataSet,
    content: &dyn RepoContentReader,
    repo: &str,
    commit: &CommitId,
    max_depth: usize,
) -> Result<usize, SealError> {
    let entries = collect_entries(set, max_depth)?;
    let mut verified = 0;

    for (path, (role, entry)) in entries {
        let declared_hash = entry
            .hashes
            .sha256_bytes()
            .ok_or_else(|| SealError::MalformedMetadata {
                path: path.to_string(),
                detail: "invalid sha256 digest".to_string(),
            })?;

        let (length, hash) = content
            .content_hash(repo, commit, path)?
            .ok_or_else(|| SealError::MissingTargetContent {
                path: path.to_string(),
            })?;

        if length != entry.length || hash != declared_hash {
            return Err(SealError::TargetContentMismatch {
                path: path.to_string(),
            });
        }

        debug!("target {} verified against role {}", path, role);
        verified += 1;
    }

    Ok(verified)
}
