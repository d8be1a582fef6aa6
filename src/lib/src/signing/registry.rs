//! Token registry: key id to token identity bookkeeping.
//!
//! Metadata names signers by key id; operators name tokens by serial
//! number. The registry maps between the two so the authoring flow can
//! route a role's key id to the token that holds it, and prompt for the
//! right token when several are enrolled.

use crate::error::SealError;
use crate::metadata::{Key, KeyId};
use std::collections::BTreeMap;

/// Mapping between metadata key ids and signing-token serial numbers.
#[derive(Debug, Default, Clone)]
pub struct TokenRegistry {
    serial_by_key: BTreeMap<KeyId, String>,
    keys_by_serial: BTreeMap<String, Vec<(KeyId, Key)>>,
}

impl TokenRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the token with `serial` holds `key`.
    pub fn register(&mut self, serial: &str, key: Key) -> Result<KeyId, SealError> {
        let keyid = key.key_id()?;
        self.serial_by_key.insert(keyid.clone(), serial.to_string());
        self.keys_by_serial
            .entry(serial.to_string())
            .or_default()
            .push((keyid.clone(), key));
        Ok(keyid)
    }

    /// Serial of the token holding `key_id`, if it was registered.
    pub fn serial_for(&self, key_id: &KeyId) -> Option<&str> {
        self.serial_by_key.get(key_id).map(String::as_str)
    }

    /// Keys held by the token with `serial`.
    pub fn keys_for_serial(&self, serial: &str) -> &[(KeyId, Key)] {
        self.keys_by_serial
            .get(serial)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All registered key ids.
    pub fn identities(&self) -> impl Iterator<Item = &KeyId> {
        self.serial_by_key.keys()
    }
}
