//! Secondary index manager
//!
//! Relationship records live under their own composite-key namespace
//! (`station~line`, `line~schedule`, `vehicle~schedule`, `train~order`) with
//! the parent id as the leading key part. "Who references X" is then a
//! prefix scan with `[X]` instead of a scan over every child record.

use crate::{
    error::Result,
    key::{make_composite_key, partial_composite_key, split_composite_key, IndexKind},
    storage::{Storage, WriteSet},
};
use std::sync::Arc;

/// Value stored for relationships that carry no payload
pub const SENTINEL: &[u8] = &[0x00];

/// One relationship record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Index the entry belongs to
    pub index: IndexKind,
    /// Full key parts, parent id first
    pub parts: Vec<String>,
    /// Stored value (sentinel or back-pointer)
    pub value: Vec<u8>,
}

impl IndexEntry {
    /// Parent/child pair with the sentinel value
    pub fn pair(index: IndexKind, parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            index,
            parts: vec![parent.into(), child.into()],
            value: SENTINEL.to_vec(),
        }
    }

    /// Replace the stored value
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }

    /// Leading key part
    pub fn parent_id(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    /// Trailing key part
    pub fn child_id(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    fn key(&self) -> Result<Vec<u8>> {
        let parts: Vec<&str> = self.parts.iter().map(String::as_str).collect();
        make_composite_key(self.index.as_str(), &parts)
    }
}

/// Maintains relationship records on top of the ledger adapter
#[derive(Clone)]
pub struct IndexManager {
    storage: Arc<dyn Storage>,
}

impl IndexManager {
    /// Create a manager over the given storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Stage a relationship record
    pub fn add_relation(&self, writes: &mut WriteSet, entry: &IndexEntry) -> Result<()> {
        writes.put(entry.key()?, entry.value.clone());

        tracing::debug!(index = %entry.index, parts = ?entry.parts, "Relation staged");

        Ok(())
    }

    /// Stage removal of a relationship record
    pub fn remove_relation(
        &self,
        writes: &mut WriteSet,
        index: IndexKind,
        parts: &[&str],
    ) -> Result<()> {
        writes.delete(make_composite_key(index.as_str(), parts)?);

        tracing::debug!(index = %index, parts = ?parts, "Relation removal staged");

        Ok(())
    }

    /// Lazily scan every entry of `index` whose leading parts equal `prefix`
    pub fn scan<'a>(
        &'a self,
        index: IndexKind,
        prefix: &[&str],
    ) -> Result<impl Iterator<Item = Result<IndexEntry>> + 'a> {
        let key_prefix = partial_composite_key(index.as_str(), prefix)?;
        let iter = self.storage.scan_prefix(&key_prefix)?;

        Ok(iter.map(move |item| {
            let (key, value) = item?;
            let (_, parts) = split_composite_key(&key)?;
            Ok(IndexEntry { index, parts, value })
        }))
    }

    /// Ids of the children related to `parent_id` through `index`
    pub fn children(&self, index: IndexKind, parent_id: &str) -> Result<Vec<String>> {
        self.scan(index, &[parent_id])?
            .map(|entry| {
                let entry = entry?;
                Ok(entry.child_id().unwrap_or_default().to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn manager() -> IndexManager {
        IndexManager::new(Arc::new(MemoryStorage::new()))
    }

    fn commit(manager: &IndexManager, writes: WriteSet) {
        manager.storage.commit(writes).unwrap();
    }

    #[test]
    fn test_add_and_scan_by_parent() {
        let manager = manager();
        let mut writes = WriteSet::new();
        for (station, line) in [("Ningbo", "1"), ("Ningbo", "2"), ("Hangzhou", "1")] {
            manager
                .add_relation(&mut writes, &IndexEntry::pair(IndexKind::StationLine, station, line))
                .unwrap();
        }
        commit(&manager, writes);

        let lines = manager.children(IndexKind::StationLine, "Ningbo").unwrap();
        assert_eq!(lines, vec!["1".to_string(), "2".to_string()]);

        let all: Vec<IndexEntry> = manager
            .scan(IndexKind::StationLine, &[])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.value == SENTINEL));
    }

    #[test]
    fn test_remove_relation() {
        let manager = manager();
        let mut writes = WriteSet::new();
        let entry = IndexEntry::pair(IndexKind::TrainOrder, "G1", "10").with_value("10");
        manager.add_relation(&mut writes, &entry).unwrap();
        commit(&manager, writes);

        let found: Vec<IndexEntry> = manager
            .scan(IndexKind::TrainOrder, &["G1"])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(found, vec![entry]);

        let mut writes = WriteSet::new();
        manager
            .remove_relation(&mut writes, IndexKind::TrainOrder, &["G1", "10"])
            .unwrap();
        commit(&manager, writes);

        assert!(manager.children(IndexKind::TrainOrder, "G1").unwrap().is_empty());
    }

    #[test]
    fn test_indexes_do_not_leak_into_each_other() {
        let manager = manager();
        let mut writes = WriteSet::new();
        manager
            .add_relation(&mut writes, &IndexEntry::pair(IndexKind::LineSchedule, "1", "5"))
            .unwrap();
        manager
            .add_relation(&mut writes, &IndexEntry::pair(IndexKind::VehicleSchedule, "1", "6"))
            .unwrap();
        commit(&manager, writes);

        assert_eq!(manager.children(IndexKind::LineSchedule, "1").unwrap(), vec!["5"]);
        assert_eq!(manager.children(IndexKind::VehicleSchedule, "1").unwrap(), vec!["6"]);
    }
}
