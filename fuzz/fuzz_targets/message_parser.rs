//! Fuzz target for wire message parsing and tag normalization
//!
//! Feeds randomly generated lines through the parser and the tag
//! normalizer, ensuring neither ever panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    // Only fuzz valid UTF-8 strings to focus on protocol-level issues
    if let Ok(input) = str::from_utf8(data) {
        // Skip empty inputs and inputs beyond the line length cap
        if input.is_empty() || input.len() > 8191 {
            return;
        }

        // Parsing may fail, but must never panic
        if let Ok(message) = twirc::Message::parse(input) {
            // Normalization is total: never panics, never errors
            let _ = twirc::normalize_tags(&message.tags);
        }
    }
});
