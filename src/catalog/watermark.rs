use chrono::{DateTime, FixedOffset};

use crate::catalog::Snapshot;
use crate::error::{Result, SyncError};

/// Most recent `plugin_modification_date` across the snapshot.
///
/// Timestamps are compared chronologically, so offsets other than `Z` are
/// handled. One malformed date fails the whole extraction.
pub fn latest_modified(snapshot: &Snapshot) -> Result<DateTime<FixedOffset>> {
    if snapshot.is_empty() {
        return Err(SyncError::EmptyInput);
    }

    let mut latest: Option<DateTime<FixedOffset>> = None;

    for entry in snapshot.entries() {
        let raw = &entry.attributes.plugin_modification_date;
        let modified = DateTime::parse_from_rfc3339(raw).map_err(|source| SyncError::Parse {
            id: entry.id,
            value: raw.clone(),
            source,
        })?;
        if latest.map_or(true, |current| modified > current) {
            latest = Some(modified);
        }
    }

    latest.ok_or(SyncError::EmptyInput)
}
