//! Metadata snapshot loader.
//!
//! Given a commit, extracts the full set of role metadata documents valid
//! at that point: the four top-level documents plus every delegated
//! document referenced (transitively) from targets. A pure transform: the
//! git collaborator supplies raw bytes, this module parses and
//! structure-checks them. Signature, version and content checks belong to
//! the trust-chain state machine.

use crate::error::SealError;
use crate::git::{CommitId, GitReader};
use crate::metadata::document::RoleDocument;
use crate::metadata::keys::{Key, KeyId, KEY_TYPE_ED25519};
use crate::metadata::role::{RoleName, RootRole, SnapshotRole, TargetsRole, TimestampRole};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The top-level role names, as they appear in root's key-set map.
pub const TOP_LEVEL_ROLES: [&str; 4] = ["root", "targets", "snapshot", "timestamp"];

/// All role metadata documents present at one commit.
///
/// A `MetadataSet` is an independent, immutable snapshot: it is
/// reconstructed fresh for every commit and never mutated across commits.
#[derive(Debug, Clone)]
pub struct MetadataSet {
    pub root: RoleDocument<RootRole>,
    pub targets: RoleDocument<TargetsRole>,
    pub snapshot: RoleDocument<SnapshotRole>,
    pub timestamp: RoleDocument<TimestampRole>,

    /// Delegated role documents by role name, discovered by walking the
    /// delegation edges declared in targets (and, transitively, in
    /// delegated documents themselves).
    pub delegated: BTreeMap<String, RoleDocument<TargetsRole>>,
}

impl MetadataSet {
    /// Load and structure-check the metadata set at `commit`.
    ///
    /// Errors: [`SealError::MissingRole`] when a required or referenced
    /// document is absent, [`SealError::MalformedMetadata`] for any
    /// structural defect, and transient collaborator errors passed through
    /// unchanged.
    pub fn load(git: &dyn GitReader, commit: &CommitId) -> Result<Self, SealError> {
        let root: RoleDocument<RootRole> = read_role(git, commit, &RoleName::Root)?;
        let targets: RoleDocument<TargetsRole> = read_role(git, commit, &RoleName::Targets)?;
        let snapshot: RoleDocument<SnapshotRole> = read_role(git, commit, &RoleName::Snapshot)?;
        let timestamp: RoleDocument<TimestampRole> =
            read_role(git, commit, &RoleName::Timestamp)?;

        validate_root(&root.signed)?;
        validate_targets_doc(&RoleName::Targets.metadata_path(), &targets.signed)?;

        // Discover delegated documents breadth-first along declared
        // delegation edges. A visited set keeps discovery finite even if
        // the edges form a cycle; the cycle itself is rejected later by the
        // delegation resolver.
        let mut delegated = BTreeMap::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        if let Some(delegations) = &targets.signed.delegations {
            for role in &delegations.roles {
                queue.push_back(role.name.clone());
            }
        }

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if TOP_LEVEL_ROLES.contains(&name.as_str()) {
                return Err(SealError::MalformedMetadata {
                    path: RoleName::Targets.metadata_path(),
                    detail: format!("delegation to reserved role name {}", name),
                });
            }

            let role_name = RoleName::Delegated(name.clone());
            let doc: RoleDocument<TargetsRole> = read_role(git, commit, &role_name)?;
            validate_targets_doc(&role_name.metadata_path(), &doc.signed)?;

            if let Some(delegations) = &doc.signed.delegations {
                for role in &delegations.roles {
                    queue.push_back(role.name.clone());
                }
            }
            delegated.insert(name, doc);
        }

        debug!(
            "loaded metadata set at {}: {} delegated role(s)",
            commit,
            delegated.len()
        );

        Ok(MetadataSet {
            root,
            targets,
            snapshot,
            timestamp,
            delegated,
        })
    }

    /// The document for a delegated role, if it was discovered.
    pub fn delegated_doc(&self, name: &str) -> Option<&RoleDocument<TargetsRole>> {
        self.delegated.get(name)
    }
}

fn read_role<T>(
    git: &dyn GitReader,
    commit: &CommitId,
    role: &RoleName,
) -> Result<RoleDocument<T>, SealError>
where
    T: crate::metadata::role::RoleMetadata + serde::de::DeserializeOwned,
{
    let path = role.metadata_path();
    let bytes = git
        .read_file(commit, &path)?
        .ok_or_else(|| SealError::MissingRole {
            role: role.as_str().to_string(),
        })?;
    RoleDocument::parse(&path, &bytes)
}

/// Structure checks for a root document: every key decodes and matches its
/// declared identifier, and every top-level role has a key set whose
/// members are all present in the key map.
fn validate_root(root: &RootRole) -> Result<(), SealError> {
    let path = RoleName::Root.metadata_path();
    validate_key_map(&path, &root.keys)?;

    for role in TOP_LEVEL_ROLES {
        let keys = root
            .roles
            .get(role)
            .ok_or_else(|| SealError::MalformedMetadata {
                path: path.clone(),
                detail: format!("no key set declared for role {}", role),
            })?;
        for keyid in &keys.keyids {
            if !root.keys.contains_key(keyid) {
                return Err(SealError::MalformedMetadata {
                    path: path.clone(),
                    detail: format!("role {} references unknown key {}", role, keyid),
                });
            }
        }
    }
    Ok(())
}

/// Structure checks shared by targets and delegated documents: digests are
/// well formed, delegation key sets are internally consistent.
fn validate_targets_doc(path: &str, doc: &TargetsRole) -> Result<(), SealError> {
    for (target, entry) in &doc.targets {
        if entry.hashes.sha256_bytes().is_none() {
            return Err(SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("target {} has an invalid sha256 digest", target),
            });
        }
    }

    if let Some(delegations) = &doc.delegations {
        validate_key_map(path, &delegations.keys)?;
        for role in &delegations.roles {
            if role.paths.is_empty() {
                return Err(SealError::MalformedMetadata {
                    path: path.to_string(),
                    detail: format!("delegation {} declares no paths", role.name),
                });
            }
            for keyid in &role.keyids {
                if !delegations.keys.contains_key(keyid) {
                    return Err(SealError::MalformedMetadata {
                        path: path.to_string(),
                        detail: format!(
                            "delegation {} references unknown key {}",
                            role.name, keyid
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_key_map(path: &str, keys: &BTreeMap<KeyId, Key>) -> Result<(), SealError> {
    for (declared, key) in keys {
        if key.keytype != KEY_TYPE_ED25519 {
            return Err(SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("key {} has unsupported type {}", declared, key.keytype),
            });
        }
        let computed = key.key_id().map_err(|_| SealError::MalformedMetadata {
            path: path.to_string(),
            detail: format!("key {} has undecodable public material", declared),
        })?;
        if computed != *declared {
            return Err(SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("key id {} does not match its public key", declared),
            });
        }
    }
    Ok(())
}
