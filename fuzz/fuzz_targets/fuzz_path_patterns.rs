//! Fuzz target for delegation path pattern matching
//!
//! Splits the input into a pattern and a path and exercises the glob
//! matcher. Patterns come from signed metadata, but paths can be chosen
//! by whoever names target files, so the matcher must never panic or
//! loop.

#![no_main]

use gitseal::verify::path_matches;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some((pattern, path)) = text.split_once('\n') else {
        return;
    };

    let _ = path_matches(pattern, path);

    // A pattern must always match itself when it contains no wildcard.
    if !pattern.contains('*') {
        assert!(path_matches(pattern, pattern));
    }
});
