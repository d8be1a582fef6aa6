//! Authoring of signed role documents.
//!
//! Layered on top of the metadata model and the signing capability:
//! canonicalize the payload, collect signatures through a scoped session,
//! bump the version by exactly one, set the expiration from a time
//! source. All the hard trust decisions stay in the validation path;
//! authoring only assembles and signs documents.

use super::SigningSession;
use crate::error::SealError;
use crate::metadata::{KeyId, RoleDocument, RoleMetadata, Signature};
use crate::time::TimeSource;
use log::debug;
use std::num::NonZeroU64;

/// Sign a role document with each of the given identities, attaching the
/// signatures to the document. A fresh signature replaces any earlier one
/// from the same key id.
pub fn sign_document<T>(
    doc: &mut RoleDocument<T>,
    session: &SigningSession<'_>,
    key_ids: &[KeyId],
) -> Result<(), SealError>
where
    T: RoleMetadata + serde::de::DeserializeOwned,
{
    let payload = doc.canonical_signed_bytes()?;
    for key_id in key_ids {
        let raw = session.sign(key_id, &payload)?;
        doc.add_signature(Signature {
            keyid: key_id.clone(),
            sig: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw),
        })?;
        debug!("signed {} document with {:?}", T::TYPE, key_id);
    }
    Ok(())
}

/// The version a successor document must carry: exactly one step above
/// its predecessor, or 1 for a first version.
pub fn next_version(previous: Option<NonZeroU64>) -> NonZeroU64 {
    match previous {
        Some(v) => v.saturating_add(1),
        None => NonZeroU64::MIN,
    }
}

/// Expiration `days` from now, per the given time source.
pub fn expiration_in_days(time: &dyn TimeSource, days: u64) -> Result<u64, SealError> {
    Ok(time.now_unix()? + days * 86400)
}
