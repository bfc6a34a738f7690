//! Analytics payloads keyed by the content hash they were computed from.

use crate::dataset::DatasetId;
use std::collections::HashMap;

use super::CommitNotice;

#[derive(Debug, Clone)]
struct Entry<T> {
    version_hash: String,
    payload: T,
}

/// Cache of derived analytics (summaries, charts, insights).
///
/// An entry is fresh only while the dataset's current hash equals the hash it
/// was computed from; version numbers are never consulted.
#[derive(Debug, Clone)]
pub struct AnalyticsCache<T> {
    entries: HashMap<DatasetId, Entry<T>>,
}

impl<T> Default for AnalyticsCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> AnalyticsCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, dataset_id: DatasetId, version_hash: impl Into<String>, payload: T) {
        self.entries.insert(
            dataset_id,
            Entry {
                version_hash: version_hash.into(),
                payload,
            },
        );
    }

    /// The cached payload, if it was computed from `current_hash`.
    pub fn fresh(&self, dataset_id: DatasetId, current_hash: &str) -> Option<&T> {
        self.entries
            .get(&dataset_id)
            .filter(|e| e.version_hash == current_hash)
            .map(|e| &e.payload)
    }

    pub fn is_stale(&self, dataset_id: DatasetId, current_hash: &str) -> bool {
        self.fresh(dataset_id, current_hash).is_none()
    }

    /// Drop the entry for the notified dataset if its hash no longer matches.
    /// Returns whether an entry was dropped.
    pub fn observe(&mut self, notice: &CommitNotice) -> bool {
        let stale = self
            .entries
            .get(&notice.dataset_id)
            .is_some_and(|e| e.version_hash != notice.version_hash);
        if stale {
            self.entries.remove(&notice.dataset_id);
            tracing::debug!("Invalidated analytics for dataset {}", notice.dataset_id);
        }
        stale
    }

    pub fn invalidate(&mut self, dataset_id: DatasetId) {
        self.entries.remove(&dataset_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn notice(dataset_id: DatasetId, hash: &str, version: u64) -> CommitNotice {
        CommitNotice {
            dataset_id,
            version,
            version_hash: hash.to_owned(),
            row_count: 1,
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn test_staleness_is_decided_by_hash_only() {
        let id = Uuid::new_v4();
        let mut cache = AnalyticsCache::new();
        cache.store(id, "abc", "summary".to_owned());

        assert_eq!(cache.fresh(id, "abc").map(String::as_str), Some("summary"));
        assert!(cache.is_stale(id, "def"));

        // a new version with identical content keeps the entry
        assert!(!cache.observe(&notice(id, "abc", 7)));
        assert_eq!(cache.len(), 1);

        assert!(cache.observe(&notice(id, "def", 8)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_other_datasets_unaffected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut cache = AnalyticsCache::new();
        cache.store(a, "1", 1_u32);
        cache.store(b, "2", 2_u32);

        cache.observe(&notice(a, "9", 2));
        assert!(cache.fresh(a, "1").is_none());
        assert_eq!(cache.fresh(b, "2"), Some(&2));

        cache.invalidate(b);
        assert!(cache.is_empty());
    }
}
