//! The incremental trust-chain state machine.
//!
//! Walks the authentication repository's history strictly after the
//! watermark, ancestor to descendant. For each commit it loads the
//! metadata snapshot, verifies root against the previously validated
//! root, verifies the top-level roles and every reachable delegated role,
//! verifies target content, and only then persists the commit as the new
//! watermark. The first failing check halts the walk: the watermark never
//! moves past a failing commit, and later commits are not examined even if
//! they might independently validate.
//!
//! Validation is inherently sequential, since commit *n+1*'s authorized
//! key sets depend on commit *n*'s verified root, so one validator instance
//! is single-threaded and synchronous. Different authentication
//! repositories validate as fully isolated instances.

use crate::chain::config::{ExpiryBehavior, ValidatorConfig};
use crate::chain::state::TrustState;
use crate::error::SealError;
use crate::git::{CommitId, GitReader, RepoContentReader};
use crate::metadata::{MetadataSet, RoleKeys, RoleName, RootRole};
use crate::store::WatermarkStore;
use crate::verify::{reachable_roles, verify_document, verify_targets};
use log::{debug, info, warn};

/// Observable state of the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorState {
    Idle,
    LoadingSnapshot(CommitId),
    VerifyingRoot(CommitId),
    VerifyingTopLevelRoles(CommitId),
    VerifyingDelegations(CommitId),
    VerifyingTargets(CommitId),
    /// The commit passed every check and was persisted as the watermark.
    Advanced(CommitId),
    /// The commit failed a trust check; the walk has halted.
    Failed(CommitId),
}

/// Terminal result of a validation run.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// Every commit past the starting watermark validated. `watermark` is
    /// the new (or unchanged) last validated commit; `None` only for a
    /// repository with no history yet.
    AllCommitsValidated { watermark: Option<CommitId> },

    /// Validation halted at `commit` with the first failing check.
    FailedAt { commit: CommitId, reason: SealError },
}

/// The incremental trust-chain validator for one authentication
/// repository.
pub struct ChainValidator<'a> {
    auth_repo: String,
    git: &'a dyn GitReader,
    content: &'a dyn RepoContentReader,
    store: &'a dyn WatermarkStore,
    config: ValidatorConfig,
    state: ValidatorState,
    trust: Option<TrustState>,
}

impl<'a> ChainValidator<'a> {
    /// Create a validator with the default configuration.
    pub fn new(
        auth_repo: impl Into<String>,
        git: &'a dyn GitReader,
        content: &'a dyn RepoContentReader,
        store: &'a dyn WatermarkStore,
    ) -> Self {
        ChainValidator {
            auth_repo: auth_repo.into(),
            git,
            content,
            store,
            config: ValidatorConfig::default(),
            state: ValidatorState::Idle,
            trust: None,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Current machine state.
    pub fn state(&self) -> &ValidatorState {
        &self.state
    }

    /// Trust state of the last validated commit, if any commit has been
    /// validated (this run or a previous one resumed from the watermark).
    pub fn trust(&self) -> Option<&TrustState> {
        self.trust.as_ref()
    }

    /// Validate every commit strictly after the stored watermark.
    ///
    /// Trust failures are reported through the returned
    /// [`ValidationOutcome`]; `Err` is reserved for transient collaborator
    /// failures, after which the caller may retry `run` without side
    /// effects: nothing was persisted for the interrupted commit.
    pub fn run(&mut self) -> Result<ValidationOutcome, SealError> {
        let watermark = self.store.load(&self.auth_repo)?;
        let commits = self.git.commits_since(watermark.as_ref())?;
        if commits.is_empty() {
            info!(
                "{}: watermark {} already at head; nothing to validate",
                self.auth_repo,
                watermark
                    .as_ref()
                    .map(|w| w.as_str())
                    .unwrap_or("(genesis)")
            );
            self.state = ValidatorState::Idle;
            return Ok(ValidationOutcome::AllCommitsValidated { watermark });
        }

        if self.trust.is_none() {
            if let Some(w) = &watermark {
                debug!("{}: resuming from watermark {}", self.auth_repo, w);
                self.trust = Some(TrustState::at_commit(self.git, w)?);
            }
        }

        info!(
            "{}: validating {} commit(s) past watermark",
            self.auth_repo,
            commits.len()
        );

        let mut advanced = watermark;
        for commit in commits {
            match self.validate_commit(&commit) {
                Ok(trust) => {
                    // Persist before installing: if the store write fails
                    // the commit must be revalidated, not remembered.
                    self.store.save(&self.auth_repo, &commit)?;
                    self.trust = Some(trust);
                    self.state = ValidatorState::Advanced(commit.clone());
                    info!("{}: advanced to {}", self.auth_repo, commit);
                    advanced = Some(commit);
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        "{}: transient failure at {}: {}; watermark unchanged",
                        self.auth_repo, commit, e
                    );
                    self.state = ValidatorState::Idle;
                    return Err(e);
                }
                Err(reason) => {
                    warn!(
                        "{}: validation failed at {}: {}",
                        self.auth_repo, commit, reason
                    );
                    self.state = ValidatorState::Failed(commit.clone());
                    return Ok(ValidationOutcome::FailedAt { commit, reason });
                }
            }
        }

        Ok(ValidationOutcome::AllCommitsValidated { watermark: advanced })
    }

    /// Run every check of one commit. On success returns the trust state
    /// the commit establishes; the caller persists the watermark and
    /// installs the state.
    fn validate_commit(&mut self, commit: &CommitId) -> Result<TrustState, SealError> {
        self.state = ValidatorState::LoadingSnapshot(commit.clone());
        let set = MetadataSet::load(self.git, commit)?;

        self.state = ValidatorState::VerifyingRoot(commit.clone());
        self.verify_root(&set)?;

        self.state = ValidatorState::VerifyingTopLevelRoles(commit.clone());
        self.verify_top_level_roles(commit, &set)?;

        self.state = ValidatorState::VerifyingDelegations(commit.clone());
        self.verify_delegations(&set)?;

        self.state = ValidatorState::VerifyingTargets(commit.clone());
        let verified = verify_targets(
            &set,
            self.content,
            &self.auth_repo,
            commit,
            self.config.max_delegation_depth,
        )?;
        debug!("{}: {} target(s) verified", commit, verified);

        Ok(TrustState::from_validated(commit.clone(), &set))
    }

    /// Root is verified against the key set and threshold of the
    /// previously validated root. The very first commit establishes
    /// initial trust unconditionally (trust on first use).
    fn verify_root(&self, set: &MetadataSet) -> Result<(), SealError> {
        let Some(prev) = &self.trust else {
            warn!(
                "{}: no prior trust state; accepting initial root v{} on first use",
                self.auth_repo,
                set.root.version()
            );
            return Ok(());
        };

        let prev_root = prev.root();
        verify_document(
            &set.root,
            "root",
            &prev_root.keys,
            role_keys(prev_root, "root")?,
        )?;

        let previous = prev_root.version.get();
        let found = set.root.version().get();
        if found < previous {
            return Err(SealError::VersionRollback {
                role: "root".to_string(),
                previous,
                found,
            });
        }
        if found == previous && set.root.raw_bytes() != prev.root_raw() {
            return Err(SealError::MalformedMetadata {
                path: RoleName::Root.metadata_path(),
                detail: "root content changed without a version bump".to_string(),
            });
        }
        if found > previous + 1 {
            return Err(SealError::VersionSkip {
                role: "root".to_string(),
                previous,
                found,
            });
        }
        Ok(())
    }

    /// Timestamp, snapshot and targets against the now-trusted root, with
    /// version monotonicity, the timestamp expiration check, and the
    /// snapshot mix-and-match cross-check.
    fn verify_top_level_roles(
        &self,
        commit: &CommitId,
        set: &MetadataSet,
    ) -> Result<(), SealError> {
        let root = &set.root.signed;

        verify_document(
            &set.timestamp,
            "timestamp",
            &root.keys,
            role_keys(root, "timestamp")?,
        )?;
        self.check_monotonic("timestamp", set.timestamp.version().get())?;

        let reference_time = self.git.reference_time(commit)?;
        let expires = set.timestamp.expires();
        if expires < reference_time {
            match self.config.expiry_behavior {
                ExpiryBehavior::Strict => {
                    return Err(SealError::Expired {
                        role: "timestamp".to_string(),
                        expires,
                        reference_time,
                    });
                }
                ExpiryBehavior::WarnOnly => {
                    warn!(
                        "{}: timestamp expired at {} (reference time {}); continuing in audit mode",
                        commit, expires, reference_time
                    );
                }
            }
        }

        verify_document(
            &set.snapshot,
            "snapshot",
            &root.keys,
            role_keys(root, "snapshot")?,
        )?;
        self.check_monotonic("snapshot", set.snapshot.version().get())?;

        verify_document(
            &set.targets,
            "targets",
            &root.keys,
            role_keys(root, "targets")?,
        )?;
        self.check_monotonic("targets", set.targets.version().get())?;

        check_snapshot_consistency(set)
    }

    /// Every delegated role reachable from targets, recursively, against
    /// the key set and threshold its parent delegates.
    fn verify_delegations(&self, set: &MetadataSet) -> Result<(), SealError> {
        for role in reachable_roles(set, self.config.max_delegation_depth)? {
            let doc = set
                .delegated_doc(role.name)
                .ok_or_else(|| SealError::MissingRole {
                    role: role.name.to_string(),
                })?;
            let keys = RoleKeys {
                keyids: role.keyids.to_vec(),
                threshold: role.threshold,
            };
            verify_document(doc, role.name, role.keys, &keys)?;
            self.check_monotonic(role.name, doc.version().get())?;
        }
        Ok(())
    }

    fn check_monotonic(&self, role: &str, found: u64) -> Result<(), SealError> {
        if let Some(previous) = self.trust.as_ref().and_then(|t| t.version_of(role)) {
            if found < previous {
                return Err(SealError::VersionRollback {
                    role: role.to_string(),
                    previous,
                    found,
                });
            }
        }
        Ok(())
    }
}

fn role_keys<'r>(root: &'r RootRole, role: &str) -> Result<&'r RoleKeys, SealError> {
    root.roles.get(role).ok_or_else(|| SealError::MissingRole {
        role: role.to_string(),
    })
}

/// The snapshot role pins the version of every other metadata document;
/// the timestamp role pins the snapshot. A document whose loaded version
/// differs from its pin is a mix-and-match replay and rejected.
fn check_snapshot_consistency(set: &MetadataSet) -> Result<(), SealError> {
    let snapshot_path = RoleName::Snapshot.metadata_path();
    let timestamp_path = RoleName::Timestamp.metadata_path();

    let pinned_snapshot = set
        .timestamp
        .signed
        .meta
        .get("snapshot.json")
        .ok_or_else(|| SealError::MalformedMetadata {
            path: timestamp_path.clone(),
            detail: "timestamp does not pin snapshot.json".to_string(),
        })?;
    if pinned_snapshot.version != set.snapshot.version() {
        return Err(SealError::MalformedMetadata {
            path: timestamp_path,
            detail: format!(
                "timestamp pins snapshot.json at v{}, found v{}",
                pinned_snapshot.version,
                set.snapshot.version()
            ),
        });
    }

    let meta = &set.snapshot.signed.meta;
    for (filename, pin) in meta {
        let loaded = match filename.as_str() {
            "root.json" => set.root.version(),
            "targets.json" => set.targets.version(),
            name => {
                let role = name.strip_suffix(".json").unwrap_or(name);
                match set.delegated_doc(role) {
                    Some(doc) => doc.version(),
                    None => {
                        return Err(SealError::MissingRole {
                            role: role.to_string(),
                        });
                    }
                }
            }
        };
        if pin.version != loaded {
            return Err(SealError::MalformedMetadata {
                path: snapshot_path.clone(),
                detail: format!(
                    "snapshot pins {} at v{}, found v{}",
                    filename, pin.version, loaded
                ),
            });
        }
    }

    let pins_targets = meta.contains_key("targets.json");
    if !pins_targets {
        return Err(SealError::MalformedMetadata {
            path: snapshot_path.clone(),
            detail: "snapshot does not pin targets.json".to_string(),
        });
    }
    for name in set.delegated.keys() {
        if !meta.contains_key(&format!("{}.json", name)) {
            return Err(SealError::MalformedMetadata {
                path: snapshot_path.clone(),
                detail: format!("snapshot does not pin {}.json", name),
            });
        }
    }

    Ok(())
}
