//! Threshold signature verification.
//!
//! A document is trusted when at least `threshold` distinct authorized
//! keys have produced valid signatures over its canonical signed bytes.
//! Signatures from keys outside the authorized set are ignored rather than
//! rejected: after a key rotation, stale signatures from retired keys may
//! legitimately linger on a document.

use crate::error::SealError;
use crate::metadata::{Key, KeyId, RoleDocument, RoleKeys, RoleMetadata, Signature};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU64;

/// Verify `signatures` over `canonical` against an authorized key set.
///
/// Counts only signatures whose key id appears in `keyids`, resolving key
/// material through `keys`, and whose Ed25519 check passes. Each key id
/// counts at most once. Returns the number of valid signatures, or
/// [`SealError::InsufficientSignatures`] if fewer than `threshold` remain
/// after filtering.
pub fn verify_signatures(
    role: &str,
    canonical: &[u8],
    signatures: &[Signature],
    keys: &BTreeMap<KeyId, Key>,
    keyids: &[KeyId],
    threshold: NonZeroU64,
) -> Result<usize, SealError> {
    let mut valid: BTreeSet<&KeyId> = BTreeSet::new();

    for signature in signatures {
        if !keyids.contains(&signature.keyid) {
            debug!(
                "{}: ignoring signature from non-authorized key {:?}",
                role, signature.keyid
            );
            continue;
        }
        if valid.contains(&signature.keyid) {
            continue;
        }
        let Some(key) = keys.get(&signature.keyid) else {
            // Authorized id without key material; structurally impossible
            // for loader-validated documents.
            continue;
        };
        let Ok(pk) = key.public_key() else {
            continue;
        };
        let Ok(sig_bytes) = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &signature.sig,
        ) else {
            debug!("{}: undecodable signature from {:?}", role, signature.keyid);
            continue;
        };
        let Ok(sig) = ed25519_compact::Signature::from_slice(&sig_bytes) else {
            debug!("{}: malformed signature from {:?}", role, signature.keyid);
            continue;
        };
        if pk.verify(canonical, &sig).is_ok() {
            valid.insert(&signature.keyid);
        } else {
            debug!("{}: invalid signature from {:?}", role, signature.keyid);
        }
    }

    if (valid.len() as u64) < threshold.get() {
        return Err(SealError::InsufficientSignatures {
            role: role.to_string(),
            valid: valid.len(),
            threshold: threshold.get(),
        });
    }

    debug!(
        "{}: {} valid signature(s), threshold {}",
        role,
        valid.len(),
        threshold
    );
    Ok(valid.len())
}

/// Verify a role document against the key set its delegating role declares
/// for it.
pub fn verify_document<T: RoleMetadata + serde::de::DeserializeOwned>(
    doc: &RoleDocument<T>,
    role: &str,
    keys: &BTreeMap<KeyId, Key>,
    role_keys: &RoleKeys,
) -> Result<usize, SealError> {
    let canonical = doc.canonical_signed_bytes()?;
    verify_signatures(
        role,
        &canonical,
        &doc.signatures,
        keys,
        &role_keys.keyids,
        role_keys.threshold,
    )
}
