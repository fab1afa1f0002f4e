//! In-memory ledger adapter
//!
//! An ordered map behind a read/write lock. Prefix scans copy the matching
//! range out under the read lock, so each scan is a snapshot.

use crate::{
    error::Result,
    storage::{KvIter, Mutation, Storage, WriteSet},
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Ledger adapter holding the world state in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// True when no key is held
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.state.read().get(key).cloned())
    }

    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Result<KvIter<'a>> {
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .state
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut state = self.state.write();
        for mutation in writes.into_mutations() {
            match mutation {
                Mutation::Put { key, value } => {
                    state.insert(key, value);
                }
                Mutation::Delete { key } => {
                    state.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_is_ordered_and_bounded() {
        let storage = MemoryStorage::new();
        let mut writes = WriteSet::new();
        writes.put(b"\x00a\x002\x00".to_vec(), b"2".to_vec());
        writes.put(b"\x00a\x001\x00".to_vec(), b"1".to_vec());
        writes.put(b"\x00b\x001\x00".to_vec(), b"x".to_vec());
        storage.commit(writes).unwrap();

        let values: Vec<Vec<u8>> = storage
            .scan_prefix(b"\x00a\x00")
            .unwrap()
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_scan_is_a_snapshot() {
        let storage = MemoryStorage::new();
        storage.put(b"\x00a\x001\x00", b"1").unwrap();

        let iter = storage.scan_prefix(b"\x00a\x00").unwrap();
        storage.put(b"\x00a\x002\x00", b"2").unwrap();

        assert_eq!(iter.count(), 1);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let storage = MemoryStorage::new();
        storage.delete(b"nothing").unwrap();
        assert!(storage.is_empty());
    }
}
