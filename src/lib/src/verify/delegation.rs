//! Delegation resolution.
//!
//! Delegations form a tree rooted at `root` -> `targets` -> nested
//! delegated roles. Resolution is an iterative walk with an explicit
//! on-path set for cycle detection; there is no runtime dispatch. When
//! several delegations declared on the same role match a path, the first
//! declared wins and later ones are not consulted.

use crate::error::SealError;
use crate::metadata::{Key, KeyId, MetadataSet, TargetsRole};
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU64;

/// One step in a resolution chain: the role that must sign for a path,
/// with the key set and threshold its parent declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleStep {
    pub role: String,
    pub keyids: Vec<KeyId>,
    pub threshold: NonZeroU64,
}

/// A delegated role reachable from targets, with everything needed to
/// verify its document: the delegating key material, the authorized key
/// ids, the threshold, and the path patterns of every edge from targets
/// down to it.
#[derive(Debug)]
pub struct ReachableRole<'a> {
    pub name: &'a str,
    pub keys: &'a BTreeMap<KeyId, Key>,
    pub keyids: &'a [KeyId],
    pub threshold: NonZeroU64,

    /// Pattern lists of each delegation edge on the chain from targets to
    /// this role. A target declared by this role is only trusted if it
    /// matches every list.
    pub path_chain: Vec<&'a [String]>,
}

/// Shell-style pattern match: `*` matches any run of characters.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == path;
    }

    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if let Some(found) = path[pos..].find(part) {
            if i == 0 && found != 0 {
                // First literal must match at the start.
                return false;
            }
            pos += found + part.len();
        } else {
            return false;
        }
    }

    if !pattern.ends_with('*') && pos != path.len() {
        return false;
    }

    true
}

/// Resolve the ordered chain of roles that must sign for `path`.
///
/// The chain starts at `targets` (with the key set and threshold root
/// declares for it) and follows the first matching delegation at each
/// level to the most specific role. Revisiting a role already on the chain
/// fails with [`SealError::DelegationCycle`].
pub fn resolve(
    set: &MetadataSet,
    path: &str,
    max_depth: usize,
) -> Result<Vec<RoleStep>, SealError> {
    let targets_keys =
        set.root
            .signed
            .roles
            .get("targets")
            .ok_or_else(|| SealError::MissingRole {
                role: "targets".to_string(),
            })?;

    let mut chain = vec![RoleStep {
        role: "targets".to_string(),
        keyids: targets_keys.keyids.clone(),
        threshold: targets_keys.threshold,
    }];
    let mut on_chain: BTreeSet<String> = BTreeSet::new();
    on_chain.insert("targets".to_string());

    let mut current: &TargetsRole = &set.targets.signed;
    loop {
        if chain.len() > max_depth {
            return Err(SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("delegation chain deeper than {}", max_depth),
            });
        }

        let Some(delegations) = &current.delegations else {
            break;
        };
        let matched = delegations
            .roles
            .iter()
            .find(|role| role.paths.iter().any(|p| path_matches(p, path)));
        let Some(role) = matched else {
            break;
        };

        if !on_chain.insert(role.name.clone()) {
            return Err(SealError::DelegationCycle {
                role: role.name.clone(),
            });
        }
        chain.push(RoleStep {
            role: role.name.clone(),
            keyids: role.keyids.clone(),
            threshold: role.threshold,
        });

        current = &set
            .delegated
            .get(&role.name)
            .ok_or_else(|| SealError::MissingRole {
                role: role.name.clone(),
            })?
            .signed;
    }

    Ok(chain)
}

/// Every delegated role reachable from targets, in declared depth-first
/// order, with its verification context.
///
/// A role reached through two distinct parents is listed once (first reach
/// wins); a role reached through itself is a cycle and fails with
/// [`SealError::DelegationCycle`].
pub fn reachable_roles<'a>(
    set: &'a MetadataSet,
    max_depth: usize,
) -> Result<Vec<ReachableRole<'a>>, SealError> {
    let mut reached = Vec::new();
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut on_path: Vec<&'a str> = Vec::new();

    walk(
        set,
        &set.targets.signed,
        &[],
        max_depth,
        &mut on_path,
        &mut seen,
        &mut reached,
    )?;
    Ok(reached)
}

fn walk<'a>(
    set: &'a MetadataSet,
    doc: &'a TargetsRole,
    chain: &[&'a [String]],
    max_depth: usize,
    on_path: &mut Vec<&'a str>,
    seen: &mut BTreeSet<&'a str>,
    reached: &mut Vec<ReachableRole<'a>>,
) -> Result<(), SealError> {
    let Some(delegations) = &doc.delegations else {
        return Ok(());
    };
    if on_path.len() >= max_depth {
        return Err(SealError::MalformedMetadata {
            path: "metadata/targets.json".to_string(),
            detail: format!("delegation tree deeper than {}", max_depth),
        });
    }

    for role in &delegations.roles {
        if on_path.contains(&role.name.as_str()) {
            return Err(SealError::DelegationCycle {
                role: role.name.clone(),
            });
        }

        let mut path_chain: Vec<&'a [String]> = chain.to_vec();
        path_chain.push(&role.paths);

        let child = set
            .delegated
            .get(&role.name)
            .ok_or_else(|| SealError::MissingRole {
                role: role.name.clone(),
            })?;

        let first_reach = seen.insert(role.name.as_str());
        if first_reach {
            reached.push(ReachableRole {
                name: role.name.as_str(),
                keys: &delegations.keys,
                keyids: &role.keyids,
                threshold: role.threshold,
                path_chain: path_chain.clone(),
            });
        }

        on_path.push(role.name.as_str());
        walk(set, &child.signed, &path_chain, max_depth, on_path, seen, reached)?;
        on_path.pop();
    }
    Ok(())
}
