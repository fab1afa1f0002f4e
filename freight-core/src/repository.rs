//! Generic entity repository
//!
//! One [`Repository`] per entity kind, all sharing the same code. The kind
//! specific parts (which parents a record needs, which relationship records
//! it owns, which indexes make it undeletable) are hooks on [`Entity`] and
//! are enforced by [`IntegrityValidator`](crate::integrity::IntegrityValidator).
//!
//! Mutating methods stage their writes into a [`WriteSet`]; the caller
//! commits once per operation.

use crate::{
    error::{Error, Result},
    index::IndexEntry,
    key::{EntityKind, IndexKind},
    storage::{Storage, WriteSet},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, marker::PhantomData, sync::Arc};

/// A primary record stored under `<kind>/<id>`
pub trait Entity:
    Serialize + DeserializeOwned + Default + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Key namespace
    const KIND: EntityKind;

    /// Indexes whose leading part is this record's id; any entry blocks deletion
    const DEPENDENT_INDEXES: &'static [IndexKind] = &[];

    /// Kinds keyed by the same id that must be deleted before this record
    const DEPENDENT_RECORDS: &'static [EntityKind] = &[];

    /// Primary key component
    fn id(&self) -> String;

    /// Records that must exist before this one is created
    fn parents(&self) -> Vec<(EntityKind, String)> {
        Vec::new()
    }

    /// Relationship records written and removed together with this record
    fn index_entries(&self) -> Vec<IndexEntry> {
        Vec::new()
    }

    /// Shape invariants checked before every write
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Transition rules checked when `self` is replaced by `next`
    fn check_update(&self, _next: &Self) -> Result<()> {
        Ok(())
    }
}

/// Storage access for one entity kind
pub struct Repository<E> {
    storage: Arc<dyn Storage>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Create a repository over the given storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _entity: PhantomData,
        }
    }

    /// Check whether a record exists
    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.storage.get(&E::KIND.key(id)?)?.is_some())
    }

    /// Load a record if present
    pub fn find(&self, id: &str) -> Result<Option<E>> {
        match self.storage.get(&E::KIND.key(id)?)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load a record
    pub fn get(&self, id: &str) -> Result<E> {
        self.find(id)?.ok_or_else(|| Error::NotFound {
            kind: E::KIND,
            id: id.to_string(),
        })
    }

    /// Stage a new record
    pub fn create(&self, writes: &mut WriteSet, entity: &E) -> Result<()> {
        let id = entity.id();
        if self.exists(&id)? {
            return Err(Error::AlreadyExists { kind: E::KIND, id });
        }
        entity.validate()?;

        self.stage_put(writes, entity)
    }

    /// Stage a replacement produced by `mutator`
    ///
    /// The mutator may not change the id or the relationship records the
    /// entity owns.
    pub fn update<F>(&self, writes: &mut WriteSet, id: &str, mutator: F) -> Result<E>
    where
        F: FnOnce(&mut E) -> Result<()>,
    {
        let current = self.get(id)?;
        let mut next = current.clone();
        mutator(&mut next)?;

        if next.id() != current.id() {
            return Err(Error::InvalidRecord(format!(
                "the {} {} may not change its id to {}",
                E::KIND,
                id,
                next.id()
            )));
        }
        if next.index_entries() != current.index_entries() {
            return Err(Error::InvalidRecord(format!(
                "the {} {} may not change its relationships",
                E::KIND,
                id
            )));
        }
        current.check_update(&next)?;
        next.validate()?;

        self.stage_put(writes, &next)?;
        Ok(next)
    }

    /// Stage removal of a record, returning what was removed
    pub fn delete(&self, writes: &mut WriteSet, id: &str) -> Result<E> {
        let current = self.get(id)?;
        writes.delete(E::KIND.key(id)?);
        Ok(current)
    }

    /// Every record of this kind in key order
    pub fn list_all(&self) -> Result<Vec<E>> {
        self.storage
            .scan_prefix(&E::KIND.prefix()?)?
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Stage an unconditional write of `entity`
    pub fn stage_put(&self, writes: &mut WriteSet, entity: &E) -> Result<()> {
        let value = serde_json::to_vec(entity)?;
        writes.put(E::KIND.key(&entity.id())?, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStorage, types::Vehicle};

    fn repo() -> (Repository<Vehicle>, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        (Repository::new(storage.clone()), storage)
    }

    fn vehicle(id: u32) -> Vehicle {
        Vehicle {
            id,
            carriage_count: 10,
            active: true,
        }
    }

    #[test]
    fn test_create_then_exists() {
        let (repo, storage) = repo();
        let mut writes = WriteSet::new();
        repo.create(&mut writes, &vehicle(1)).unwrap();

        // Nothing visible until commit
        assert!(!repo.exists("1").unwrap());
        storage.commit(writes).unwrap();
        assert!(repo.exists("1").unwrap());
        assert_eq!(repo.get("1").unwrap().carriage_count, 10);
    }

    #[test]
    fn test_create_twice_is_already_exists() {
        let (repo, storage) = repo();
        let mut writes = WriteSet::new();
        repo.create(&mut writes, &vehicle(1)).unwrap();
        storage.commit(writes).unwrap();

        let mut writes = WriteSet::new();
        let mut other = vehicle(1);
        other.carriage_count = 99;
        let err = repo.create(&mut writes, &other).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { kind: EntityKind::Vehicle, .. }));
        assert!(writes.is_empty());
    }

    #[test]
    fn test_get_update_delete_missing_is_not_found() {
        let (repo, _storage) = repo();
        let mut writes = WriteSet::new();

        assert!(matches!(repo.get("7"), Err(Error::NotFound { .. })));
        assert!(matches!(
            repo.update(&mut writes, "7", |_| Ok(())),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(repo.delete(&mut writes, "7"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_update_cannot_change_id() {
        let (repo, storage) = repo();
        let mut writes = WriteSet::new();
        repo.create(&mut writes, &vehicle(1)).unwrap();
        storage.commit(writes).unwrap();

        let mut writes = WriteSet::new();
        let err = repo
            .update(&mut writes, "1", |v| {
                v.id = 2;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));

        let updated = repo
            .update(&mut writes, "1", |v| {
                v.active = false;
                Ok(())
            })
            .unwrap();
        storage.commit(writes).unwrap();
        assert!(!updated.active);
        assert!(!repo.get("1").unwrap().active);
    }

    #[test]
    fn test_delete_then_not_exists() {
        let (repo, storage) = repo();
        let mut writes = WriteSet::new();
        repo.create(&mut writes, &vehicle(1)).unwrap();
        storage.commit(writes).unwrap();

        let mut writes = WriteSet::new();
        let removed = repo.delete(&mut writes, "1").unwrap();
        storage.commit(writes).unwrap();

        assert_eq!(removed.id, 1);
        assert!(!repo.exists("1").unwrap());
    }

    #[test]
    fn test_list_all_in_key_order() {
        let (repo, storage) = repo();
        let mut writes = WriteSet::new();
        for id in [3, 1, 2] {
            repo.create(&mut writes, &vehicle(id)).unwrap();
        }
        storage.commit(writes).unwrap();

        let ids: Vec<u32> = repo.list_all().unwrap().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
