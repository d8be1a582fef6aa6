//! Configuration for the trust-chain validator.

/// Configuration for chain validation.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum delegation depth below `targets`.
    ///
    /// Deeper trees are rejected as malformed.
    pub max_delegation_depth: usize,

    /// How to treat an expired timestamp role.
    pub expiry_behavior: ExpiryBehavior,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_delegation_depth: 8,
            expiry_behavior: ExpiryBehavior::Strict,
        }
    }
}

impl ValidatorConfig {
    /// Configuration for forensic replay of a repository whose metadata
    /// has lapsed: expirations are logged instead of failing the walk.
    /// Every other invariant is still enforced.
    pub fn audit() -> Self {
        Self {
            expiry_behavior: ExpiryBehavior::WarnOnly,
            ..Self::default()
        }
    }

    /// Set the maximum delegation depth.
    pub fn with_max_delegation_depth(mut self, depth: usize) -> Self {
        self.max_delegation_depth = depth;
        self
    }
}

/// How to handle metadata whose expiration has passed the commit's
/// reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryBehavior {
    /// Fail the commit. This is the default and the only safe choice for
    /// live validation.
    #[default]
    Strict,

    /// Log a warning and continue. For offline forensic replay only.
    WarnOnly,
}
