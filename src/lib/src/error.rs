/// The gitseal error type.
///
/// Every variant except [`SealError::Io`] and [`SealError::Collaborator`] is
/// a trust failure: permanent for the commit being validated, halting the
/// walk. The two transient variants are collaborator-level and may be
/// retried without side effects, since nothing is persisted before a commit
/// fully validates.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("malformed metadata in {path}: {detail}")]
    MalformedMetadata { path: String, detail: String },

    #[error("role {role} is referenced but has no metadata document")]
    MissingRole { role: String },

    #[error("insufficient signatures for {role}: {valid} valid of {threshold} required")]
    InsufficientSignatures {
        role: String,
        valid: usize,
        threshold: u64,
    },

    #[error("version rollback for {role}: {previous} -> {found}")]
    VersionRollback {
        role: String,
        previous: u64,
        found: u64,
    },

    #[error("version skip for {role}: {previous} -> {found}")]
    VersionSkip {
        role: String,
        previous: u64,
        found: u64,
    },

    #[error("{role} expired: expires {expires}, reference time {reference_time}")]
    Expired {
        role: String,
        expires: u64,
        reference_time: u64,
    },

    #[error("delegation cycle through {role}")]
    DelegationCycle { role: String },

    #[error("target content mismatch for {path}")]
    TargetContentMismatch { path: String },

    #[error("declared target {path} has no corresponding content")]
    MissingTargetContent { path: String },

    #[error("Ed25519 signature function error")]
    Crypto(#[from] ed25519_compact::Error),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("unknown signing identity: {0}")]
    UnknownIdentity(String),

    #[error("signing hardware unavailable: {0}")]
    SigningUnavailable(String),

    #[error("signing cancelled by operator")]
    SigningCancelled,

    #[error("internal error: [{0}]")]
    Internal(String),
}

impl SealError {
    /// Whether this error is transient.
    ///
    /// Transient errors come from a collaborator (git, content store,
    /// watermark store) and may be retried from the same commit; they never
    /// advance or regress the watermark.
    pub fn is_transient(&self) -> bool {
        matches!(self, SealError::Io(_) | SealError::Collaborator(_))
    }

    /// Whether this error is a trust failure for the commit under
    /// validation.
    ///
    /// Trust failures are permanent for that commit: the walk halts and no
    /// later commit is examined until the repository is remediated.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            SealError::MalformedMetadata { .. }
                | SealError::MissingRole { .. }
                | SealError::InsufficientSignatures { .. }
                | SealError::VersionRollback { .. }
                | SealError::VersionSkip { .. }
                | SealError::Expired { .. }
                | SealError::DelegationCycle { .. }
                | SealError::TargetContentMismatch { .. }
                | SealError::MissingTargetContent { .. }
        )
    }
}
