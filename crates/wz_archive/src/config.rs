//! `key|value` sidecar files that describe indexed archive groups.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Reads a sidecar `.ini`: one `key|value` pair per line, blank lines
/// ignored.
pub(crate) fn read_ini(path: &Path) -> Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)?;

    let mut entries = HashMap::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        let [key, value] = parts[..] else {
            return Err(Error::InvalidConfig(format!("malformed line {line:?}")));
        };
        entries.insert(key.to_string(), value.to_string());
    }
    Ok(entries)
}

/// The highest member index of a group, from its required `LastWzIndex` key.
pub(crate) fn last_wz_index(entries: &HashMap<String, String>) -> Result<i32> {
    let raw = entries
        .get("LastWzIndex")
        .ok_or_else(|| Error::InvalidConfig("missing LastWzIndex".into()))?;
    raw.parse()
        .map_err(|_| Error::InvalidConfig(format!("LastWzIndex {raw:?} is not a number")))
}
