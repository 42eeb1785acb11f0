use std::collections::{HashMap, HashSet};

use crate::models::Record;

/// Records seen on each monitored URL as of its last successful check.
///
/// An absent entry means the URL was never checked successfully.
#[derive(Debug, Default)]
pub struct ObservationStore {
    entries: HashMap<String, HashSet<Record>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&HashSet<Record>> {
        self.entries.get(url)
    }

    /// Replaces the entry for `url` wholesale, returning the previous one.
    pub fn replace(&mut self, url: &str, records: HashSet<Record>) -> Option<HashSet<Record>> {
        self.entries.insert(url.to_string(), records)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Number of URLs with a baseline.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
