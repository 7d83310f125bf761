use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::Snapshot;

/// How each incoming entry was classified by [`merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub new: usize,
    pub updated: usize,
    pub duplicate: usize,
}

impl MergeResult {
    pub fn total(&self) -> usize {
        self.new + self.updated + self.duplicate
    }
}

/// Fold `incoming` into `base`, in order.
///
/// Unknown ids are appended and bump both counts. Known ids are replaced in
/// place unless content-equal, in which case they are counted as duplicates.
/// Repeated ids within `incoming` resolve to the last occurrence.
pub fn merge(mut base: Snapshot, incoming: &Snapshot) -> (Snapshot, MergeResult) {
    let mut result = MergeResult::default();

    let entries = &mut base.data.plugin_details;
    let mut index: HashMap<i64, usize> = entries
        .iter()
        .enumerate()
        .map(|(pos, entry)| (entry.id, pos))
        .collect();

    for candidate in incoming.entries() {
        match index.get(&candidate.id).copied() {
            Some(pos) if entries[pos].content_eq(candidate) => result.duplicate += 1,
            Some(pos) => {
                entries[pos] = candidate.clone();
                result.updated += 1;
            }
            None => {
                index.insert(candidate.id, entries.len());
                entries.push(candidate.clone());
                base.total_count += 1;
                base.size += 1;
                result.new += 1;
            }
        }
    }

    (base, result)
}
