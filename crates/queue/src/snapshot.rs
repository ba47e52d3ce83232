//! Point-in-time view of the queue returned by `list_all`.

use crate::error::QueueError;
use crate::record::{PendingRecord, RecordKey};

/// All records queued at the moment of the read, in insertion order.
///
/// Rows are kept in their stored form and decoded one at a time while
/// iterating. Calling [`iter`](QueueSnapshot::iter) again starts over from the
/// first row.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    rows: Vec<(RecordKey, String)>,
}

impl QueueSnapshot {
    pub fn from_rows(rows: Vec<(RecordKey, String)>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<RecordKey> {
        self.rows.iter().map(|(k, _)| *k).collect()
    }

    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter {
            rows: self.rows.iter(),
        }
    }

    /// Decode every row, failing on the first corrupt one.
    pub fn into_records(self) -> Result<Vec<(RecordKey, PendingRecord)>, QueueError> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a QueueSnapshot {
    type Item = Result<(RecordKey, PendingRecord), QueueError>;
    type IntoIter = SnapshotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazily decoding iterator over a [`QueueSnapshot`].
pub struct SnapshotIter<'a> {
    rows: std::slice::Iter<'a, (RecordKey, String)>,
}

impl Iterator for SnapshotIter<'_> {
    type Item = Result<(RecordKey, PendingRecord), QueueError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, payload) = self.rows.next()?;
        Some(
            PendingRecord::from_payload(payload)
                .map(|record| (*key, record))
                .map_err(|e| QueueError::Corrupt {
                    key: key.0,
                    reason: e.to_string(),
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
