//! # log
//!
//! why: keep the ordered entry sequence a leader replicates to its peers
//! relations: owned by node.rs, entries travel inside message.rs, persisted
//! via concord-storage
//! what: Entry, Mark, sentinel-anchored Log with suffix extraction

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single entry in the replicated log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// position in the log, starting at 1 (0 is the sentinel)
    pub index: i64,
    /// term at which this entry was proposed
    pub term: i64,
    /// full cluster id list, present only on a fresh cluster's bootstrap
    /// entry at index 1
    #[serde(default)]
    pub peers: Option<Vec<i64>>,
    /// opaque command payload, empty for election no-ops
    #[serde(default)]
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(index: i64, term: i64, data: Vec<u8>) -> Self {
        Self { index, term, peers: None, data }
    }

    /// the `(index, term)` pair naming this entry's position
    pub fn mark(&self) -> Mark {
        Mark { index: self.index, term: self.term }
    }
}

/// A `(log-index, log-term)` pair identifying a log position.
///
/// Vote requests carry the sender's head mark; append requests carry the
/// predecessor position the recipient must already hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub index: i64,
    pub term: i64,
}

/// The replicated log.
///
/// Position 0 always holds the `(0, 0)` sentinel, so `entries[i].index == i`
/// for every stored entry and index arithmetic never special-cases an empty
/// log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    entries: Vec<Entry>,
}

impl Log {
    /// a log holding only the index-0 sentinel
    pub fn new() -> Self {
        Self { entries: vec![Entry::default()] }
    }

    /// Validate and adopt an externally supplied entry sequence.
    ///
    /// The sequence must open with the zero sentinel and stay contiguous.
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self, CoreError> {
        let first = entries
            .first()
            .ok_or_else(|| CoreError::malformed("log cannot be empty"))?;
        if first.index != 0 || first.term != 0 {
            return Err(CoreError::malformed(format!(
                "log must open with the (0, 0) sentinel, got ({}, {})",
                first.index, first.term
            )));
        }
        for pair in entries.windows(2) {
            if pair[1].index != pair[0].index + 1 {
                return Err(CoreError::malformed(format!(
                    "discontinuous index {} after {}",
                    pair[1].index, pair[0].index
                )));
            }
        }
        Ok(Self { entries })
    }

    /// `(index, term)` of the last entry
    pub fn head_mark(&self) -> Mark {
        self.entries[self.entries.len() - 1].mark()
    }

    /// entry at log index `i`, if the log extends that far
    pub fn at(&self, i: i64) -> Option<&Entry> {
        usize::try_from(i).ok().and_then(|i| self.entries.get(i))
    }

    /// entries strictly after index `i`
    pub fn suffix_from(&self, i: i64) -> &[Entry] {
        match usize::try_from(i.saturating_add(1)) {
            Ok(start) if start < self.entries.len() => &self.entries[start..],
            _ => &[],
        }
    }

    /// Append one entry at head + 1 proposed at `term`, returning a copy.
    pub fn append(&mut self, data: Vec<u8>, term: i64) -> Entry {
        let entry = Entry::new(self.head_mark().index + 1, term, data);
        self.entries.push(entry.clone());
        entry
    }

    /// entries after the sentinel; this is what collaborators persist
    pub fn tail(&self) -> &[Entry] {
        &self.entries[1..]
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_heads_at_sentinel() {
        let log = Log::new();
        assert_eq!(log.head_mark(), Mark { index: 0, term: 0 });
        assert!(log.tail().is_empty());
    }

    #[test]
    fn append_advances_head() {
        let mut log = Log::new();
        let e = log.append(b"set k v".to_vec(), 3);
        assert_eq!(e.index, 1);
        assert_eq!(e.term, 3);
        assert_eq!(log.head_mark(), Mark { index: 1, term: 3 });

        let e = log.append(Vec::new(), 4);
        assert_eq!(e.index, 2);
        assert_eq!(log.head_mark(), Mark { index: 2, term: 4 });
    }

    #[test]
    fn from_entries_rejects_missing_sentinel() {
        let err = Log::from_entries(vec![Entry::new(1, 1, Vec::new())]).unwrap_err();
        assert!(matches!(err, CoreError::MalformedLog { .. }));
    }

    #[test]
    fn from_entries_rejects_sentinel_with_term() {
        let err = Log::from_entries(vec![Entry::new(0, 5, Vec::new())]).unwrap_err();
        assert!(matches!(err, CoreError::MalformedLog { .. }));
    }

    #[test]
    fn from_entries_rejects_gap() {
        let err = Log::from_entries(vec![
            Entry::default(),
            Entry::new(2, 1, Vec::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::MalformedLog { .. }));
    }

    #[test]
    fn from_entries_rejects_empty() {
        assert!(Log::from_entries(Vec::new()).is_err());
    }

    #[test]
    fn suffix_is_strictly_after_the_given_index() {
        let mut log = Log::new();
        log.append(vec![1], 1);
        log.append(vec![2], 1);
        log.append(vec![3], 2);

        let suffix = log.suffix_from(1);
        assert_eq!(suffix.len(), 2);
        assert_eq!(suffix[0].index, 2);
        assert_eq!(suffix[1].index, 3);

        assert!(log.suffix_from(3).is_empty());
        assert!(log.suffix_from(99).is_empty());
        assert_eq!(log.suffix_from(-1).len(), 4); // sentinel onward
    }

    #[test]
    fn at_is_total() {
        let mut log = Log::new();
        log.append(vec![1], 1);

        assert_eq!(log.at(0).map(|e| e.mark()), Some(Mark { index: 0, term: 0 }));
        assert_eq!(log.at(1).map(|e| e.index), Some(1));
        assert!(log.at(2).is_none());
        assert!(log.at(-7).is_none());
    }
}
