//! Fuzz target for role document parsing
//!
//! Feeds arbitrary bytes to the signed-envelope parser for every role
//! schema. Parsing untrusted repository bytes is the main attack surface
//! of the loader.
//!
//! Security concerns:
//! - Panics on malformed JSON structures
//! - Envelope/payload confusion between role types
//! - Canonicalization of parsed documents

#![no_main]

use gitseal::metadata::{RoleDocument, RootRole, SnapshotRole, TargetsRole, TimestampRole};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(doc) = RoleDocument::<RootRole>::parse("metadata/root.json", data) {
        let _ = doc.canonical_signed_bytes();
        let bytes = doc.to_bytes();
        let _ = RoleDocument::<RootRole>::parse("metadata/root.json", &bytes);
    }

    if let Ok(doc) = RoleDocument::<TargetsRole>::parse("metadata/targets.json", data) {
        let _ = doc.canonical_signed_bytes();
        for entry in doc.signed.targets.values() {
            let _ = entry.hashes.sha256_bytes();
        }
    }

    if let Ok(doc) = RoleDocument::<SnapshotRole>::parse("metadata/snapshot.json", data) {
        let _ = doc.canonical_signed_bytes();
    }

    if let Ok(doc) = RoleDocument::<TimestampRole>::parse("metadata/timestamp.json", data) {
        let _ = doc.canonical_signed_bytes();
    }
});
