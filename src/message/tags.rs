//! Raw tag section handling.
//!
//! The tags section is a `;`-delimited list of `key=value` pairs. Values
//! stay wire-escaped in the decoded map; only serialization-level
//! escaping of freshly set values lives here.

use std::collections::HashMap;
use std::fmt::{Result as FmtResult, Write};

/// Split a raw tags section (without the leading `@`) into a key/value map.
///
/// A key without `=` maps to the empty string. Values are not unescaped.
pub(crate) fn split_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Write a tag map back out as a `;`-delimited section.
pub(crate) fn format_tags(f: &mut dyn Write, tags: &HashMap<String, String>) -> FmtResult {
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            f.write_char(';')?;
        }
        f.write_str(key)?;
        if !value.is_empty() {
            f.write_char('=')?;
            f.write_str(value)?;
        }
    }
    Ok(())
}
