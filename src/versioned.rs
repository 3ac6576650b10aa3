//! Sparse version-indexed timelines
//!
//! Entries are appended in strictly increasing version order. Lookups
//! return the entry at or before the queried version, so a gap means
//! "unchanged since the previous entry".

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    entries: Vec<(u64, T)>,
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Versioned { entries: Vec::new() }
    }
}

impl<T> Versioned<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Re-recording the latest version overwrites it;
    /// recording an older version is an invariant violation.
    pub fn record(&mut self, version: u64, value: T) {
        match self.entries.last_mut() {
            Some((latest, slot)) if *latest == version => *slot = value,
            Some((latest, _)) => {
                assert!(
                    *latest < version,
                    "versioned write out of order: {} after {}",
                    version,
                    latest
                );
                self.entries.push((version, value));
            }
            None => self.entries.push((version, value)),
        }
    }

    /// Entry in force at `version`.
    pub fn at(&self, version: u64) -> Option<&T> {
        let idx = self.entries.partition_point(|(v, _)| *v <= version);
        idx.checked_sub(1).map(|i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
