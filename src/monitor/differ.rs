use std::collections::{HashMap, HashSet};

use crate::models::Record;

use super::store::ObservationStore;

/// Commits `current` as the baseline for `url` and returns the records whose
/// links were not in the previous baseline, in order of first appearance.
///
/// The first observation of a URL only establishes the baseline and yields
/// nothing.
pub fn diff(store: &mut ObservationStore, url: &str, current: Vec<Record>) -> Vec<Record> {
    let current = dedup_by_link(current);

    let new_records = match store.get(url) {
        Some(previous) => current
            .iter()
            .filter(|record| !previous.contains(*record))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    store.replace(url, current.into_iter().collect::<HashSet<_>>());
    new_records
}

/// One record per link; the last occurrence supplies the value, the first
/// occurrence fixes the position.
fn dedup_by_link(records: Vec<Record>) -> Vec<Record> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(record.link()) {
            Some(&index) => unique[index] = record,
            None => {
                positions.insert(record.link().to_string(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}
