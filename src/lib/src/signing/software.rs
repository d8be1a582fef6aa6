//! Software signing provider (development/testing only).
//!
//! Keys live in process memory without hardware protection. Use for
//! development, tests and CI fixtures; production metadata is signed with
//! hardware-backed providers.

use super::SigningProvider;
use crate::error::SealError;
use crate::metadata::{Key, KeyId};
use log::warn;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory Ed25519 signing provider.
pub struct SoftwareSigner {
    keys: Mutex<BTreeMap<KeyId, ed25519_compact::KeyPair>>,
}

impl SoftwareSigner {
    /// Create an empty provider.
    pub fn new() -> Self {
        warn!(
            "creating software signing provider - keys are held in process \
             memory without hardware protection"
        );
        SoftwareSigner {
            keys: Mutex::new(BTreeMap::new()),
        }
    }

    /// Generate a fresh identity and return its key id.
    pub fn generate_identity(&self) -> Result<KeyId, SealError> {
        let keypair = ed25519_compact::KeyPair::generate();
        self.import_keypair(keypair)
    }

    /// Import an existing key pair, e.g. a fixture key. Returns the
    /// derived key id.
    pub fn import_keypair(&self, keypair: ed25519_compact::KeyPair) -> Result<KeyId, SealError> {
        let keyid = KeyId::from_raw_public(keypair.pk.as_ref())?;
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| SealError::Internal("key store lock poisoned".to_string()))?;
        keys.insert(keyid.clone(), keypair);
        Ok(keyid)
    }
}

impl Default for SoftwareSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningProvider for SoftwareSigner {
    fn name(&self) -> &str {
        "Software (Development Only)"
    }

    fn list_identities(&self) -> Result<Vec<KeyId>, SealError> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| SealError::Internal("key store lock poisoned".to_string()))?;
        Ok(keys.keys().cloned().collect())
    }

    fn public_key(&self, key_id: &KeyId) -> Result<Key, SealError> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| SealError::Internal("key store lock poisoned".to_string()))?;
        let keypair = keys
            .get(key_id)
            .ok_or_else(|| SealError::UnknownIdentity(key_id.to_string()))?;
        Ok(Key::from_public_key(&keypair.pk))
    }

    fn sign(&self, key_id: &KeyId, payload: &[u8]) -> Result<Vec<u8>, SealError> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| SealError::Internal("key store lock poisoned".to_string()))?;
        let keypair = keys
            .get(key_id)
            .ok_or_else(|| SealError::UnknownIdentity(key_id.to_string()))?;
        Ok(keypair.sk.sign(payload, None).to_vec())
    }
}
