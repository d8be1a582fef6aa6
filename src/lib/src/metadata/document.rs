//! The signed document envelope.
//!
//! A role document on disk is `{ "signed": {...}, "signatures": [...] }`.
//! Signatures cover the canonical JSON form of the `signed` value. The
//! envelope keeps both the parsed payload and the value it was parsed from,
//! so canonical bytes are computed from what was actually on disk rather
//! than from a struct round-trip.

use crate::canonical::to_canonical_json;
use crate::error::SealError;
use crate::metadata::keys::KeyId;
use crate::metadata::role::RoleMetadata;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

/// A signature and the key id that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature {
    /// Identifier of the signing key, as listed in the delegating role.
    pub keyid: KeyId,

    /// Base64-encoded Ed25519 signature over the canonical signed bytes.
    pub sig: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    signed: serde_json::Value,
    signatures: Vec<Signature>,
}

/// A parsed role document together with its signatures.
#[derive(Debug, Clone)]
pub struct RoleDocument<T> {
    /// The typed role payload.
    pub signed: T,

    /// Signatures over the canonical form of the payload.
    pub signatures: Vec<Signature>,

    signed_value: serde_json::Value,
    raw: Vec<u8>,
}

impl<T: RoleMetadata + DeserializeOwned> RoleDocument<T> {
    /// Parse a document from raw repository bytes.
    ///
    /// `path` is used only for error context. Structural problems (invalid
    /// JSON, missing fields, a zero version, a wrong `_type` tag) are
    /// reported as [`SealError::MalformedMetadata`].
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self, SealError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("invalid envelope: {}", e),
            })?;

        let signed: T = serde_json::from_value(envelope.signed.clone()).map_err(|e| {
            SealError::MalformedMetadata {
                path: path.to_string(),
                detail: format!("invalid {} payload: {}", T::TYPE, e),
            }
        })?;

        Ok(RoleDocument {
            signed,
            signatures: envelope.signatures,
            signed_value: envelope.signed,
            raw: bytes.to_vec(),
        })
    }

    /// Build an unsigned document from a role payload (authoring path).
    pub fn from_signed(signed: T) -> Result<Self, SealError> {
        let signed_value = serde_json::to_value(&signed)
            .map_err(|e| SealError::Internal(format!("payload serialization failed: {}", e)))?;
        let mut doc = RoleDocument {
            signed,
            signatures: Vec::new(),
            signed_value,
            raw: Vec::new(),
        };
        doc.refresh_raw()?;
        Ok(doc)
    }

    /// Canonical bytes of the `signed` value; this is what signatures are
    /// computed and verified over.
    pub fn canonical_signed_bytes(&self) -> Result<Vec<u8>, SealError> {
        to_canonical_json(&self.signed_value)
    }

    /// The exact serialized form of the envelope. For parsed documents this
    /// is the bytes read from the repository; for authored documents it is
    /// refreshed whenever a signature is attached.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Serialized envelope bytes, suitable for committing to the
    /// authentication repository.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw.clone()
    }

    /// Attach a signature, replacing any previous signature from the same
    /// key id.
    pub fn add_signature(&mut self, signature: Signature) -> Result<(), SealError> {
        self.signatures.retain(|s| s.keyid != signature.keyid);
        self.signatures.push(signature);
        self.refresh_raw()
    }

    /// Version of the signed payload.
    pub fn version(&self) -> NonZeroU64 {
        self.signed.version()
    }

    /// Expiration of the signed payload (Unix seconds).
    pub fn expires(&self) -> u64 {
        self.signed.expires()
    }

    fn refresh_raw(&mut self) -> Result<(), SealError> {
        let envelope = Envelope {
            signed: self.signed_value.clone(),
            signatures: self.signatures.clone(),
        };
        self.raw = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| SealError::Internal(format!("envelope serialization failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::role::SnapshotRole;
    use std::collections::BTreeMap;
    use std::num::NonZeroU64;

    fn snapshot_doc() -> RoleDocument<SnapshotRole> {
        RoleDocument::from_signed(SnapshotRole {
            version: NonZeroU64::new(3).unwrap(),
            expires: 1704067200,
            meta: BTreeMap::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_roundtrip() {
        let doc = snapshot_doc();
        let bytes = doc.to_bytes();

        let parsed: RoleDocument<SnapshotRole> =
            RoleDocument::parse("metadata/snapshot.json", &bytes).unwrap();
        assert_eq!(parsed.signed, doc.signed);
        assert_eq!(parsed.raw_bytes(), bytes.as_slice());
        assert_eq!(
            parsed.canonical_signed_bytes().unwrap(),
            doc.canonical_signed_bytes().unwrap()
        );
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = RoleDocument::<SnapshotRole>::parse("metadata/snapshot.json", b"{nope")
            .unwrap_err();
        match err {
            SealError::MalformedMetadata { path, .. } => {
                assert_eq!(path, "metadata/snapshot.json");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_wrong_role_type() {
        let json = serde_json::json!({
            "signed": {
                "_type": "timestamp",
                "version": 1,
                "expires": 1704067200,
                "meta": {}
            },
            "signatures": []
        });
        let bytes = serde_json::to_vec(&json).unwrap();
        let err =
            RoleDocument::<SnapshotRole>::parse("metadata/snapshot.json", &bytes).unwrap_err();
        assert!(matches!(err, SealError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_add_signature_replaces_same_key() {
        let mut doc = snapshot_doc();
        let keyid = KeyId::from_raw_public(&[1u8; 32]).unwrap();

        doc.add_signature(Signature {
            keyid: keyid.clone(),
            sig: "old".to_string(),
        })
        .unwrap();
        doc.add_signature(Signature {
            keyid: keyid.clone(),
            sig: "new".to_string(),
        })
        .unwrap();

        assert_eq!(doc.signatures.len(), 1);
        assert_eq!(doc.signatures[0].sig, "new");

        // raw bytes track the signature set
        let parsed: RoleDocument<SnapshotRole> =
            RoleDocument::parse("metadata/snapshot.json", &doc.to_bytes()).unwrap();
        assert_eq!(parsed.signatures, doc.signatures);
    }

    #[test]
    fn test_canonical_bytes_ignore_envelope_formatting() {
        let doc = snapshot_doc();
        // Reserialize the envelope compactly; canonical signed bytes must
        // not change.
        let value: serde_json::Value = serde_json::from_slice(&doc.to_bytes()).unwrap();
        let compact = serde_json::to_vec(&value).unwrap();
        let reparsed: RoleDocument<SnapshotRole> =
            RoleDocument::parse("metadata/snapshot.json", &compact).unwrap();
        assert_eq!(
            reparsed.canonical_signed_bytes().unwrap(),
            doc.canonical_signed_bytes().unwrap()
        );
    }
}
