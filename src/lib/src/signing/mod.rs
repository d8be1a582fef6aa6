//! Hardware-backed signing for metadata authoring.
//!
//! Validation never signs anything; this module serves only the authoring
//! path that produces new signed role documents. The physical token
//! protocol is out of scope: a provider is an abstract capability that
//! can enumerate identities, expose public keys and sign payloads. The
//! key material itself never crosses the trait boundary.
//!
//! Providers are explicit capability handles, never ambient state: the
//! authoring flow acquires a [`SigningSession`] scoped around each signing
//! operation and releases it on drop.

mod author;
mod registry;
mod software;

pub use author::*;
pub use registry::*;
pub use software::*;

use crate::error::SealError;
use crate::metadata::{Key, KeyId};
use log::debug;

/// Abstract signing capability.
///
/// Implementations wrap a smart-card session, an HSM slot, or (for
/// development and tests) in-memory software keys. Identities are the
/// derived metadata key ids of the keys the provider holds, so a role's
/// authorized key id can be routed directly to the token that holds it.
///
/// # Failure modes
///
/// - [`SealError::SigningUnavailable`]: no token present, or the token
///   cannot be opened.
/// - [`SealError::SigningCancelled`]: the operator declined the operation.
/// - [`SealError::UnknownIdentity`]: the provider does not hold the key.
pub trait SigningProvider: Send + Sync {
    /// Human-readable provider name, e.g. `"YubiKey PIV"`.
    fn name(&self) -> &str;

    /// Key ids of every identity this provider holds.
    fn list_identities(&self) -> Result<Vec<KeyId>, SealError>;

    /// Public key of one identity.
    fn public_key(&self, key_id: &KeyId) -> Result<Key, SealError>;

    /// Sign a payload with one identity. Returns the raw Ed25519
    /// signature bytes.
    fn sign(&self, key_id: &KeyId, payload: &[u8]) -> Result<Vec<u8>, SealError>;
}

/// A scoped acquisition of a signing provider.
///
/// Construction probes the provider (a provider with no reachable
/// identities is unavailable); drop releases it. Holding the session is
/// the only way the authoring flow signs.
pub struct SigningSession<'a> {
    provider: &'a dyn SigningProvider,
}

impl<'a> SigningSession<'a> {
    /// Acquire a session, probing the provider.
    pub fn acquire(provider: &'a dyn SigningProvider) -> Result<Self, SealError> {
        let identities = provider.list_identities()?;
        if identities.is_empty() {
            return Err(SealError::SigningUnavailable(format!(
                "{} holds no identities",
                provider.name()
            )));
        }
        debug!(
            "acquired signing session on {} ({} identities)",
            provider.name(),
            identities.len()
        );
        Ok(SigningSession { provider })
    }

    /// The provider this session is scoped over.
    pub fn provider(&self) -> &dyn SigningProvider {
        self.provider
    }

    /// Sign a payload with one of the provider's identities.
    pub fn sign(&self, key_id: &KeyId, payload: &[u8]) -> Result<Vec<u8>, SealError> {
        self.provider.sign(key_id, payload)
    }
}

impl std::fmt::Debug for SigningSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Drop for SigningSession<'_> {
    fn drop(&mut self) {
        debug!("released signing session on {}", self.provider.name());
    }
}
