//! Canonical byte representation of role metadata.
//!
//! Signatures cover the canonical JSON form of a document's `signed` value,
//! so that cosmetic re-serialization (whitespace, key order) never
//! invalidates a signature. Canonicalization follows the canonical JSON
//! convention: object keys sorted, no insignificant whitespace.

use crate::error::SealError;
use olpc_cjson::CanonicalFormatter;
use serde::Serialize;

/// Serialize a JSON value into its canonical byte representation.
pub fn to_canonical_json(value: &serde_json::Value) -> Result<Vec<u8>, SealError> {
    let mut data = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut data, CanonicalFormatter::new());
    value
        .serialize(&mut ser)
        .map_err(|e| SealError::Internal(format!("canonical serialization failed: {}", e)))?;
    Ok(data)
}

/// SHA-256 digest of a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    hmac_sha256::Hash::hash(data)
}
