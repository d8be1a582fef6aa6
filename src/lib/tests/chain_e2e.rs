//! End-to-end tests for the trust-chain validator.
//!
//! Each test authors real signed metadata with the software signing
//! provider, serves it from an in-memory git reader, and drives the full
//! state machine: bootstrap, key thresholds, version monotonicity,
//! freshness, delegations, target content, watermark persistence.

use gitseal::chain::{ChainValidator, ValidationOutcome, ValidatorConfig};
use gitseal::metadata::{
    DelegatedRole, Delegations, Hashes, Key, KeyId, MetaEntry, RoleDocument, RoleKeys,
    RoleMetadata, RoleName, RootRole, SnapshotRole, TargetEntry, TargetsRole, TimestampRole,
};
use gitseal::signing::{sign_document, SigningProvider, SigningSession, SoftwareSigner};
use gitseal::{
    sha256, CommitId, GitReader, MemoryContentReader, MemoryGitReader, MemoryWatermarkStore,
    SealError, WatermarkStore,
};
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const AUTH_REPO: &str = "law-auth";
const FAR_FUTURE: u64 = 4_000_000_000;

fn version(n: u64) -> NonZeroU64 {
    NonZeroU64::new(n).unwrap()
}

/// Authoring-side half of the fixture: keys and signed-document helpers.
struct Fixture {
    signer: SoftwareSigner,
    root_keys: Vec<KeyId>,
    targets_key: KeyId,
    snapshot_key: KeyId,
    timestamp_key: KeyId,
    git: MemoryGitReader,
    content: MemoryContentReader,
}

impl Fixture {
    fn new() -> Self {
        let signer = SoftwareSigner::new();
        let root_keys = (0..3)
            .map(|_| signer.generate_identity().unwrap())
            .collect::<Vec<_>>();
        let targets_key = signer.generate_identity().unwrap();
        let snapshot_key = signer.generate_identity().unwrap();
        let timestamp_key = signer.generate_identity().unwrap();
        Fixture {
            signer,
            root_keys,
            targets_key,
            snapshot_key,
            timestamp_key,
            git: MemoryGitReader::new(),
            content: MemoryContentReader::new(),
        }
    }

    fn key_of(&self, keyid: &KeyId) -> Key {
        self.signer.public_key(keyid).unwrap()
    }

    /// Root with 3 root keys at threshold 2 and single-key top-level roles.
    fn root_role(&self, root_version: u64) -> RootRole {
        let mut keys = BTreeMap::new();
        for keyid in self
            .root_keys
            .iter()
            .chain([&self.targets_key, &self.snapshot_key, &self.timestamp_key])
        {
            keys.insert(keyid.clone(), self.key_of(keyid));
        }

        let mut roles = BTreeMap::new();
        roles.insert(
            "root".to_string(),
            RoleKeys {
                keyids: self.root_keys.clone(),
                threshold: version(2),
            },
        );
        for (role, keyid) in [
            ("targets", &self.targets_key),
            ("snapshot", &self.snapshot_key),
            ("timestamp", &self.timestamp_key),
        ] {
            roles.insert(
                role.to_string(),
                RoleKeys {
                    keyids: vec![keyid.clone()],
                    threshold: version(1),
                },
            );
        }

        RootRole {
            version: version(root_version),
            expires: FAR_FUTURE,
            keys,
            roles,
        }
    }

    fn sign_and_store<T>(&mut self, commit: &str, role: &RoleName, signed: T, signers: &[KeyId])
    where
        T: RoleMetadata + serde::de::DeserializeOwned,
    {
        let mut doc = RoleDocument::from_signed(signed).unwrap();
        let session = SigningSession::acquire(&self.signer).unwrap();
        sign_document(&mut doc, &session, signers).unwrap();
        self.git
            .add_file(commit, &role.metadata_path(), doc.to_bytes());
    }

    fn store_content(&mut self, commit: &str, path: &str, content: &[u8]) {
        self.content
            .add_content(AUTH_REPO, commit, path, content.len() as u64, sha256(content));
    }

    /// Author a full commit: root (signed by `root_signers`), targets,
    /// snapshot and timestamp, with snapshot pins computed from the
    /// documents themselves.
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        id: &str,
        time: u64,
        root_version: u64,
        root_signers: &[KeyId],
        targets: TargetsRole,
        delegated: Vec<(&str, TargetsRole, Vec<KeyId>)>,
        snapshot_version: u64,
        timestamp_version: u64,
        timestamp_expires: u64,
    ) {
        self.git.add_commit(id, time);

        let root = self.root_role(root_version);
        self.sign_and_store(id, &RoleName::Root, root, root_signers);

        let mut pins = BTreeMap::new();
        pins.insert(
            "targets.json".to_string(),
            MetaEntry {
                version: targets.version,
            },
        );
        for (name, doc, _) in &delegated {
            pins.insert(
                format!("{}.json", name),
                MetaEntry {
                    version: doc.version,
                },
            );
        }

        let targets_signer = [self.targets_key.clone()];
        self.sign_and_store(id, &RoleName::Targets, targets, &targets_signer);

        for (name, doc, signers) in delegated {
            self.sign_and_store(id, &RoleName::Delegated(name.to_string()), doc, &signers);
        }

        let snapshot = SnapshotRole {
            version: version(snapshot_version),
            expires: FAR_FUTURE,
            meta: pins,
        };
        let snapshot_signer = [self.snapshot_key.clone()];
        self.sign_and_store(id, &RoleName::Snapshot, snapshot, &snapshot_signer);

        let mut ts_meta = BTreeMap::new();
        ts_meta.insert(
            "snapshot.json".to_string(),
            MetaEntry {
                version: version(snapshot_version),
            },
        );
        let timestamp = TimestampRole {
            version: version(timestamp_version),
            expires: timestamp_expires,
            meta: ts_meta,
        };
        let timestamp_signer = [self.timestamp_key.clone()];
        self.sign_and_store(id, &RoleName::Timestamp, timestamp, &timestamp_signer);
    }

    fn all_root_keys(&self) -> Vec<KeyId> {
        self.root_keys.clone()
    }
}

fn entry_for(content: &[u8]) -> TargetEntry {
    TargetEntry {
        length: content.len() as u64,
        hashes: Hashes::from_sha256(sha256(content)),
        custom: BTreeMap::new(),
    }
}

fn targets_role(targets_version: u64, entries: Vec<(&str, TargetEntry)>) -> TargetsRole {
    TargetsRole {
        version: version(targets_version),
        expires: FAR_FUTURE,
        targets: entries
            .into_iter()
            .map(|(p, e)| (p.to_string(), e))
            .collect(),
        delegations: None,
    }
}

#[test]
fn test_end_to_end_scenario() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    // Genesis: root (3 keys, threshold 2) and one tracked file at hash H1.
    let h1_content = b"tracked repository state 1";
    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![("law-xml", entry_for(h1_content))]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.store_content("c1", "law-xml", h1_content);

    // Commit 2: tracked file moves to H2, targets bumps 1 -> 2.
    let h2_content = b"tracked repository state 2";
    fx.commit(
        "c2",
        2000,
        1,
        &root_signers,
        targets_role(2, vec![("law-xml", entry_for(h2_content))]),
        vec![],
        2,
        2,
        FAR_FUTURE,
    );
    fx.store_content("c2", "law-xml", h2_content);

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::AllCommitsValidated { watermark } => {
            assert_eq!(watermark, Some(CommitId::new("c2")));
        }
        other => panic!("expected full validation, got {other:?}"),
    }
    assert_eq!(store.load(AUTH_REPO).unwrap(), Some(CommitId::new("c2")));

    // Commit 3: declared hash regresses to H1 while actual content is H2.
    fx.commit(
        "c3",
        3000,
        1,
        &root_signers,
        targets_role(2, vec![("law-xml", entry_for(h1_content))]),
        vec![],
        2,
        2,
        FAR_FUTURE,
    );
    fx.store_content("c3", "law-xml", h2_content);

    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c3"));
            assert!(
                matches!(reason, SealError::TargetContentMismatch { path } if path == "law-xml")
            );
        }
        other => panic!("expected failure at c3, got {other:?}"),
    }
    // The watermark never moves past a failing commit.
    assert_eq!(store.load(AUTH_REPO).unwrap(), Some(CommitId::new("c2")));
}

#[test]
fn test_snapshot_rollback_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        5,
        1,
        FAR_FUTURE,
    );
    fx.commit(
        "c2",
        2000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        4,
        2,
        FAR_FUTURE,
    );

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(
                reason,
                SealError::VersionRollback {
                    role,
                    previous: 5,
                    found: 4,
                } if role == "snapshot"
            ));
        }
        other => panic!("expected rollback failure, got {other:?}"),
    }
    assert_eq!(store.load(AUTH_REPO).unwrap(), Some(CommitId::new("c1")));
}

#[test]
fn test_root_threshold_enforced() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    // Root requires 2 of 3; sign the successor with only one key.
    let one_signer = vec![fx.root_keys[0].clone()];
    fx.commit(
        "c2",
        2000,
        1,
        &one_signer,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        FAR_FUTURE,
    );

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(
                reason,
                SealError::InsufficientSignatures {
                    valid: 1,
                    threshold: 2,
                    ..
                }
            ));
        }
        other => panic!("expected threshold failure, got {other:?}"),
    }

    // Exactly threshold (2 of 3) passes, on a fresh history.
    let mut fx2 = Fixture::new();
    let signers2 = fx2.all_root_keys();
    fx2.commit(
        "c1",
        1000,
        1,
        &signers2,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    let two = vec![fx2.root_keys[0].clone(), fx2.root_keys[1].clone()];
    fx2.commit(
        "c2",
        2000,
        1,
        &two,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        FAR_FUTURE,
    );
    let store2 = MemoryWatermarkStore::new();
    let mut validator2 = ChainValidator::new(AUTH_REPO, &fx2.git, &fx2.content, &store2);
    let outcome2 = validator2.run().unwrap();
    assert!(matches!(
        outcome2,
        ValidationOutcome::AllCommitsValidated { watermark: Some(w) } if w == CommitId::new("c2")
    ));
}

#[test]
fn test_expired_timestamp_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    // Timestamp expired strictly before the commit's reference time.
    fx.commit(
        "c2",
        5000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        4999,
    );

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(
                reason,
                SealError::Expired {
                    expires: 4999,
                    reference_time: 5000,
                    ..
                }
            ));
        }
        other => panic!("expected expiry failure, got {other:?}"),
    }

    // Audit mode replays the same history with a warning instead.
    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store)
        .with_config(ValidatorConfig::audit());
    let outcome = validator.run().unwrap();
    assert!(matches!(
        outcome,
        ValidationOutcome::AllCommitsValidated { .. }
    ));
}

#[test]
fn test_root_version_skip_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    // Root jumps 1 -> 3.
    fx.commit(
        "c2",
        2000,
        3,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        FAR_FUTURE,
    );

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { reason, .. } => {
            assert!(matches!(
                reason,
                SealError::VersionSkip {
                    previous: 1,
                    found: 3,
                    ..
                }
            ));
        }
        other => panic!("expected version-skip failure, got {other:?}"),
    }
}

#[test]
fn test_root_single_step_advance_accepted() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.commit(
        "c2",
        2000,
        2,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        FAR_FUTURE,
    );

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    assert!(matches!(
        outcome,
        ValidationOutcome::AllCommitsValidated { watermark: Some(w) } if w == CommitId::new("c2")
    ));
}

#[test]
fn test_delegated_role_verified_and_rollback_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();
    let delegated_key = fx.signer.generate_identity().unwrap();

    let project_content = b"delegated project content";

    let delegations = |fx: &Fixture| Delegations {
        keys: {
            let mut keys = BTreeMap::new();
            keys.insert(delegated_key.clone(), fx.key_of(&delegated_key));
            keys
        },
        roles: vec![DelegatedRole {
            name: "projects".to_string(),
            keyids: vec![delegated_key.clone()],
            threshold: version(1),
            paths: vec!["projects/*".to_string()],
        }],
    };

    let mut top = targets_role(1, vec![]);
    top.delegations = Some(delegations(&fx));
    let project = targets_role(3, vec![("projects/law-xml", entry_for(project_content))]);
    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        top,
        vec![("projects", project, vec![delegated_key.clone()])],
        1,
        1,
        FAR_FUTURE,
    );
    fx.store_content("c1", "projects/law-xml", project_content);

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    assert!(matches!(
        outcome,
        ValidationOutcome::AllCommitsValidated { watermark: Some(w) } if w == CommitId::new("c1")
    ));

    // Delegated role version regresses 3 -> 2 in the next commit.
    let mut top = targets_role(2, vec![]);
    top.delegations = Some(delegations(&fx));
    let stale = targets_role(2, vec![("projects/law-xml", entry_for(project_content))]);
    fx.commit(
        "c2",
        2000,
        1,
        &root_signers,
        top,
        vec![("projects", stale, vec![delegated_key.clone()])],
        2,
        2,
        FAR_FUTURE,
    );
    fx.store_content("c2", "projects/law-xml", project_content);

    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(
                reason,
                SealError::VersionRollback {
                    role,
                    previous: 3,
                    found: 2,
                } if role == "projects"
            ));
        }
        other => panic!("expected delegated rollback failure, got {other:?}"),
    }
}

/// Content reader wrapper that counts calls, to observe that an
/// already-advanced watermark causes no re-verification work.
struct CountingContentReader<'a> {
    inner: &'a MemoryContentReader,
    calls: AtomicUsize,
}

impl gitseal::RepoContentReader for CountingContentReader<'_> {
    fn content_hash(
        &self,
        repo: &str,
        commit: &CommitId,
        path: &str,
    ) -> Result<Option<(u64, [u8; 32])>, SealError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.content_hash(repo, commit, path)
    }
}

#[test]
fn test_idempotent_rerun_is_noop() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();
    let body = b"content";

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![("law-xml", entry_for(body))]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.store_content("c1", "law-xml", body);

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    validator.run().unwrap();
    assert_eq!(store.load(AUTH_REPO).unwrap(), Some(CommitId::new("c1")));

    // Rerun with the watermark already at head.
    let counting = CountingContentReader {
        inner: &fx.content,
        calls: AtomicUsize::new(0),
    };
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &counting, &store);
    let outcome = validator.run().unwrap();
    assert!(matches!(
        outcome,
        ValidationOutcome::AllCommitsValidated { watermark: Some(w) } if w == CommitId::new("c1")
    ));
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

/// Store whose first save fails, simulating a crash between passing all
/// checks and persisting the watermark.
struct FlakyStore {
    inner: MemoryWatermarkStore,
    fail_next: AtomicBool,
}

impl WatermarkStore for FlakyStore {
    fn load(&self, auth_repo: &str) -> Result<Option<CommitId>, SealError> {
        self.inner.load(auth_repo)
    }

    fn save(&self, auth_repo: &str, commit: &CommitId) -> Result<(), SealError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SealError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "simulated crash during watermark write",
            )));
        }
        self.inner.save(auth_repo, commit)
    }
}

#[test]
fn test_crash_consistency_revalidates_interrupted_commit() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();
    let body = b"content";

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![("law-xml", entry_for(body))]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.store_content("c1", "law-xml", body);

    let store = FlakyStore {
        inner: MemoryWatermarkStore::new(),
        fail_next: AtomicBool::new(true),
    };

    // First run: every check passes, the watermark write is interrupted.
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let err = validator.run().unwrap_err();
    assert!(err.is_transient());
    assert!(store.load(AUTH_REPO).unwrap().is_none());

    // Second run revalidates c1 and reaches the same result.
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    assert!(matches!(
        outcome,
        ValidationOutcome::AllCommitsValidated { watermark: Some(w) } if w == CommitId::new("c1")
    ));
    assert_eq!(store.load(AUTH_REPO).unwrap(), Some(CommitId::new("c1")));
}

#[test]
fn test_root_mutation_without_version_bump_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.commit(
        "c2",
        2000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        2,
        FAR_FUTURE,
    );
    // Tamper: same root version, different content (expires nudged).
    let mut mutated = fx.root_role(1);
    mutated.expires = FAR_FUTURE - 1;
    fx.sign_and_store("c2", &RoleName::Root, mutated, &root_signers);

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(reason, SealError::MalformedMetadata { .. }));
        }
        other => panic!("expected mutation failure, got {other:?}"),
    }
}

#[test]
fn test_mix_and_match_snapshot_pin_rejected() {
    let mut fx = Fixture::new();
    let root_signers = fx.all_root_keys();

    fx.commit(
        "c1",
        1000,
        1,
        &root_signers,
        targets_role(1, vec![]),
        vec![],
        1,
        1,
        FAR_FUTURE,
    );
    fx.commit(
        "c2",
        2000,
        1,
        &root_signers,
        targets_role(2, vec![]),
        vec![],
        2,
        2,
        FAR_FUTURE,
    );
    // Replay the snapshot from c1 (which pins targets at v1) into c2.
    let replayed = fx
        .git
        .read_file(&CommitId::new("c1"), "metadata/snapshot.json")
        .unwrap()
        .unwrap();
    fx.git.add_file("c2", "metadata/snapshot.json", replayed);

    let store = MemoryWatermarkStore::new();
    let mut validator = ChainValidator::new(AUTH_REPO, &fx.git, &fx.content, &store);
    let outcome = validator.run().unwrap();
    match outcome {
        ValidationOutcome::FailedAt { commit, reason } => {
            assert_eq!(commit, CommitId::new("c2"));
            assert!(matches!(reason, SealError::MalformedMetadata { .. }));
        }
        other => panic!("expected mix-and-match failure, got {other:?}"),
    }
}
