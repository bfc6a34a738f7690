use crate::dataset::{DatasetId, DatasetListItem, DatasetSnapshot};
use crate::error::{DataOpsError, Result};
use std::collections::HashMap;

/// Committed snapshots by id, kept for the session lifetime.
#[derive(Debug, Clone, Default)]
pub struct DatasetCache {
    snapshots: HashMap<DatasetId, DatasetSnapshot>,
    /// Upload order, for listing
    order: Vec<DatasetId>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: DatasetSnapshot) {
        let id = snapshot.id();
        if self.snapshots.insert(id, snapshot).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: DatasetId) -> Option<&DatasetSnapshot> {
        self.snapshots.get(&id)
    }

    pub fn require(&self, id: DatasetId) -> Result<&DatasetSnapshot> {
        self.get(id)
            .ok_or_else(|| DataOpsError::DatasetNotFound(id.to_string()))
    }

    /// Replace a cached snapshot with its committed successor.
    pub fn commit(&mut self, snapshot: DatasetSnapshot) -> Result<()> {
        let slot = self
            .snapshots
            .get_mut(&snapshot.id())
            .ok_or_else(|| DataOpsError::DatasetNotFound(snapshot.id().to_string()))?;
        if snapshot.version() <= slot.version() {
            return Err(DataOpsError::ConcurrentModification(format!(
                "Cannot commit v{} over v{} of '{}'",
                snapshot.version(),
                slot.version(),
                slot.file_name()
            )));
        }
        *slot = snapshot;
        Ok(())
    }

    pub fn list(&self, active: Option<DatasetId>) -> Vec<DatasetListItem> {
        self.order
            .iter()
            .filter_map(|id| self.snapshots.get(id))
            .map(|s| s.list_item(Some(s.id()) == active))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataops::{OperationKind, TransformationPlan, TransformationRunner};
    use crate::dataset::{CellValue, ColumnKind, ColumnSchema, Record};
    use crate::integrity::HashAlgorithm;

    fn snapshot(name: &str) -> Result<DatasetSnapshot> {
        let columns = vec![ColumnSchema::new("x", ColumnKind::Number, 1.0)];
        let records = vec![
            Record::from([("x".to_owned(), CellValue::Number(1.0))]),
            Record::from([("x".to_owned(), CellValue::Number(1.0))]),
        ];
        DatasetSnapshot::create(name, columns, records, HashAlgorithm::Rolling32)
    }

    #[test]
    fn test_list_keeps_upload_order_and_flags_active() -> Result<()> {
        let mut cache = DatasetCache::new();
        let a = snapshot("a.csv")?;
        let b = snapshot("b.csv")?;
        let b_id = b.id();
        cache.insert(a);
        cache.insert(b);

        let list = cache.list(Some(b_id));
        let names: Vec<&str> = list.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(list.iter().filter(|i| i.active).count(), 1);
        assert!(list.last().is_some_and(|i| i.active));
        Ok(())
    }

    #[test]
    fn test_commit_requires_newer_version() -> Result<()> {
        let mut cache = DatasetCache::new();
        let original = snapshot("a.csv")?;
        cache.insert(original.clone());

        let next = TransformationRunner::default()
            .execute(&original, &TransformationPlan::single(OperationKind::Deduplicate), None)?
            .snapshot;
        cache.commit(next.clone())?;
        assert_eq!(cache.require(original.id())?.version(), 2);
        assert_eq!(cache.list(None).first().map(|i| i.rows), Some(1));

        assert!(matches!(
            cache.commit(original),
            Err(DataOpsError::ConcurrentModification(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_dataset() {
        let cache = DatasetCache::new();
        assert!(matches!(
            cache.require(uuid::Uuid::new_v4()),
            Err(DataOpsError::DatasetNotFound(_))
        ));
    }
}
