use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::trade::TradeRecord;

/// Identity keys of trades that have already been uploaded in past runs.
pub type SeenKeySet = HashSet<String>;

/// Loads the persisted seen-key set; a missing file is an empty set, not an
/// error (first run).
pub fn load_seen_keys(path: &Path) -> Result<SeenKeySet> {
    if !path.exists() {
        debug!("No seen-key file at {:?}, starting fresh", path);
        return Ok(SeenKeySet::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seen-key file {:?}", path))?;
    let keys: Vec<String> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in seen-key file {:?}", path))?;
    Ok(keys.into_iter().collect())
}

pub fn save_seen_keys(path: &Path, keys: &SeenKeySet) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut sorted: Vec<&String> = keys.iter().collect();
    sorted.sort();
    let content = serde_json::to_string_pretty(&sorted)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write seen-key file {:?}", path))?;
    Ok(())
}

/// Drops records whose identity key was seen in a prior run. Pure with
/// respect to its inputs; persisting the updated set is the caller's job.
pub fn filter_new(
    keyed_records: Vec<(String, TradeRecord)>,
    seen: &SeenKeySet,
) -> (Vec<TradeRecord>, SeenKeySet) {
    let mut updated = seen.clone();
    let mut new_records = Vec::new();

    for (key, record) in keyed_records {
        if updated.insert(key) {
            new_records.push(record);
        }
    }

    (new_records, updated)
}
