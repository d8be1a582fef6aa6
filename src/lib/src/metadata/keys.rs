//! Metadata keys and key identifiers.

use crate::canonical::sha256;
use crate::error::SealError;
use ct_codecs::{Encoder, Hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key type tag for Ed25519 keys, the only algorithm currently supported.
pub const KEY_TYPE_ED25519: &str = "ed25519";

/// Identifier of a metadata key.
///
/// Derived, never chosen: the lowercase hex SHA-256 of the raw public key
/// bytes. The loader recomputes the identifier for every declared key and
/// rejects documents whose declared identifier does not match.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Derive the identifier for raw public key bytes.
    pub fn from_raw_public(raw: &[u8]) -> Result<Self, SealError> {
        let id = Hex::encode_to_string(sha256(raw))
            .map_err(|_| SealError::Internal("hex encoding failed".to_string()))?;
        Ok(KeyId(id))
    }

    /// The textual (hex) form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full ids are 64 hex chars; the first 8 are enough to tell keys
        // apart in logs.
        let short = if self.0.len() > 8 { &self.0[..8] } else { &self.0 };
        write!(f, "KeyId({}..)", short)
    }
}

/// A public key entry in role metadata.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Key {
    /// Algorithm tag, e.g. `"ed25519"`.
    pub keytype: String,

    /// Base64-encoded raw public key bytes.
    pub public: String,
}

impl Key {
    /// Wrap an Ed25519 public key as a metadata key entry.
    pub fn from_public_key(pk: &ed25519_compact::PublicKey) -> Self {
        Key {
            keytype: KEY_TYPE_ED25519.to_string(),
            public: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                pk.as_ref(),
            ),
        }
    }

    /// Raw public key bytes.
    pub fn raw(&self) -> Result<Vec<u8>, SealError> {
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &self.public)
            .map_err(|e| SealError::Internal(format!("invalid public key base64: {}", e)))
    }

    /// Derive this key's identifier.
    pub fn key_id(&self) -> Result<KeyId, SealError> {
        KeyId::from_raw_public(&self.raw()?)
    }

    /// The Ed25519 public key, if the key type is supported.
    pub fn public_key(&self) -> Result<ed25519_compact::PublicKey, SealError> {
        if self.keytype != KEY_TYPE_ED25519 {
            return Err(SealError::UnsupportedKeyType(self.keytype.clone()));
        }
        Ok(ed25519_compact::PublicKey::from_slice(&self.raw()?)?)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key {{ {} [{}] }}", self.keytype, self.public)
    }
}
