//! Typed role metadata.
//!
//! Role documents are JSON files under the authentication repository's
//! `metadata/` tree. The four top-level roles each have a fixed document
//! (`root.json`, `targets.json`, `snapshot.json`, `timestamp.json`);
//! delegated roles live in `<name>.json` and share the targets schema.
//! Every document carries a `_type` tag, a monotonically non-decreasing
//! version and a Unix-seconds expiration.

use crate::metadata::keys::{Key, KeyId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;

/// Directory of role metadata inside the authentication repository.
pub const METADATA_DIR: &str = "metadata";

/// The name of a metadata role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleName {
    Root,
    Targets,
    Snapshot,
    Timestamp,
    /// A role delegated to (transitively) by `targets`.
    Delegated(String),
}

impl RoleName {
    /// The role's name as it appears in key-set maps and logs.
    pub fn as_str(&self) -> &str {
        match self {
            RoleName::Root => "root",
            RoleName::Targets => "targets",
            RoleName::Snapshot => "snapshot",
            RoleName::Timestamp => "timestamp",
            RoleName::Delegated(name) => name,
        }
    }

    /// Path of the role's document inside the repository tree.
    pub fn metadata_path(&self) -> String {
        format!("{}/{}.json", METADATA_DIR, self.as_str())
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common view over role metadata payloads.
pub trait RoleMetadata: Serialize {
    /// The `_type` tag of this role's documents.
    const TYPE: &'static str;

    /// Version number. Clients never accept a document with a version lower
    /// than the one previously validated.
    fn version(&self) -> NonZeroU64;

    /// Expiration as Unix seconds.
    fn expires(&self) -> u64;
}

/// Key ids and signature threshold for one role, as declared by root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleKeys {
    /// Identifiers of the keys authorized for the role.
    pub keyids: Vec<KeyId>,

    /// Minimum number of distinct valid signatures required.
    pub threshold: NonZeroU64,
}

/// The root role: establishes the trusted key sets and thresholds for all
/// top-level roles, including itself. Key rotation is expressed as a new
/// root version listing new key sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "root")]
pub struct RootRole {
    pub version: NonZeroU64,
    pub expires: u64,

    /// All keys referenced by the top-level role key sets, by identifier.
    pub keys: BTreeMap<KeyId, Key>,

    /// Key set and threshold per top-level role name.
    pub roles: BTreeMap<String, RoleKeys>,
}

impl RoleMetadata for RootRole {
    const TYPE: &'static str = "root";

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn expires(&self) -> u64 {
        self.expires
    }
}

/// A target entry: declared length and hash of one tracked file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetEntry {
    /// Content length in bytes.
    pub length: u64,

    /// Content hashes, keyed by algorithm.
    pub hashes: Hashes,

    /// Opaque application data. Target files that track a git repository
    /// carry the tracked commit id under the `"commit"` key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// Hash dictionary for a target entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hashes {
    /// Lowercase hex SHA-256 digest.
    pub sha256: String,
}

impl Hashes {
    /// Wrap a raw digest.
    pub fn from_sha256(digest: [u8; 32]) -> Self {
        Hashes {
            sha256: hex::encode(digest),
        }
    }

    /// Decode the declared digest. `None` if it is not 32 bytes of hex.
    pub fn sha256_bytes(&self) -> Option<[u8; 32]> {
        let decoded = hex::decode(&self.sha256).ok()?;
        decoded.try_into().ok()
    }
}

/// The targets role (and, schema-wise, every delegated role): declares the
/// set of trusted target files and any delegations of authority over
/// subsets of the target namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "targets")]
pub struct TargetsRole {
    pub version: NonZeroU64,
    pub expires: u64,

    /// Declared target entries by path.
    pub targets: BTreeMap<String, TargetEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,
}

impl RoleMetadata for TargetsRole {
    const TYPE: &'static str = "targets";

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn expires(&self) -> u64 {
        self.expires
    }
}

/// Delegation block inside a targets document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delegations {
    /// Public keys for the delegated roles, by identifier.
    pub keys: BTreeMap<KeyId, Key>,

    /// Delegated roles in declared order. When several delegations match
    /// the same path, the first declared wins; later ones are not
    /// consulted.
    pub roles: Vec<DelegatedRole>,
}

/// One delegation edge: authority over a set of path patterns handed to a
/// named child role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegatedRole {
    pub name: String,

    /// Identifiers of the keys authorized to sign the child role.
    pub keyids: Vec<KeyId>,

    /// Signature threshold for the child role.
    pub threshold: NonZeroU64,

    /// Shell-style path patterns (`*` wildcard) this role is trusted for.
    pub paths: Vec<String>,
}

/// Version entry in snapshot and timestamp meta maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaEntry {
    pub version: NonZeroU64,
}

/// The snapshot role: records the expected version of every other metadata
/// document, preventing mix-and-match replay of individually valid
/// documents from different points in history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "snapshot")]
pub struct SnapshotRole {
    pub version: NonZeroU64,
    pub expires: u64,

    /// Expected versions by metadata filename, e.g. `"targets.json"`.
    pub meta: BTreeMap<String, MetaEntry>,
}

impl RoleMetadata for SnapshotRole {
    const TYPE: &'static str = "snapshot";

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn expires(&self) -> u64 {
        self.expires
    }
}

/// The timestamp role: short-lived freshness bound over the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "timestamp")]
pub struct TimestampRole {
    pub version: NonZeroU64,
    pub expires: u64,

    /// Expected snapshot version, keyed `"snapshot.json"`.
    pub meta: BTreeMap<String, MetaEntry>,
}

impl RoleMetadata for TimestampRole {
    const TYPE: &'static str = "timestamp";

    fn version(&self) -> NonZeroU64 {
        self.version
    }

    fn expires(&self) -> u64 {
        self.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn test_role_name_paths() {
        assert_eq!(RoleName::Root.metadata_path(), "metadata/root.json");
        assert_eq!(
            RoleName::Delegated("projects".to_string()).metadata_path(),
            "metadata/projects.json"
        );
    }

    #[test]
    fn test_root_serde_carries_type_tag() {
        let root = RootRole {
            version: version(1),
            expires: 1704067200,
            keys: BTreeMap::new(),
            roles: BTreeMap::new(),
        };

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["_type"], "root");

        let parsed: RootRole = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn test_wrong_type_tag_rejected() {
        let json = serde_json::json!({
            "_type": "targets",
            "version": 1,
            "expires": 1704067200,
            "keys": {},
            "roles": {}
        });
        assert!(serde_json::from_value::<RootRole>(json).is_err());
    }

    #[test]
    fn test_zero_version_rejected() {
        let json = serde_json::json!({
            "_type": "snapshot",
            "version": 0,
            "expires": 1704067200,
            "meta": {}
        });
        assert!(serde_json::from_value::<SnapshotRole>(json).is_err());
    }

    #[test]
    fn test_targets_roundtrip_with_delegations() {
        let mut targets = BTreeMap::new();
        targets.insert(
            "repo-a".to_string(),
            TargetEntry {
                length: 64,
                hashes: Hashes::from_sha256([3u8; 32]),
                custom: BTreeMap::new(),
            },
        );

        let role = TargetsRole {
            version: version(2),
            expires: 1704067200,
            targets,
            delegations: Some(Delegations {
                keys: BTreeMap::new(),
                roles: vec![DelegatedRole {
                    name: "projects".to_string(),
                    keyids: vec![],
                    threshold: version(1),
                    paths: vec!["projects/*".to_string()],
                }],
            }),
        };

        let json = serde_json::to_string(&role).unwrap();
        let parsed: TargetsRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, role);
    }

    #[test]
    fn test_hashes_decode() {
        let hashes = Hashes::from_sha256([0xabu8; 32]);
        assert_eq!(hashes.sha256_bytes(), Some([0xabu8; 32]));

        let bad = Hashes {
            sha256: "zz".to_string(),
        };
        assert!(bad.sha256_bytes().is_none());

        let short = Hashes {
            sha256: "abcd".to_string(),
        };
        assert!(short.sha256_bytes().is_none());
    }
}
