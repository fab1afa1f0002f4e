//! Referential integrity validator
//!
//! Wraps repository creates and deletes with the checks a relational engine
//! would do through foreign keys:
//!
//! - **Create guard**: every parent returned by [`Entity::parents`] must
//!   exist, otherwise `DependencyMissing` and nothing is staged.
//! - **Delete guard**: every index in [`Entity::DEPENDENT_INDEXES`] is
//!   scanned with the record's id as prefix, and every kind in
//!   [`Entity::DEPENDENT_RECORDS`] is looked up under the same id; any hit is
//!   `InUse` and nothing is staged.
//!
//! Relationship records owned by an entity are staged in the same
//! [`WriteSet`] as the entity itself, so record and index entries commit
//! together.

use crate::{
    error::{Error, Result},
    index::IndexManager,
    key::EntityKind,
    repository::{Entity, Repository},
    storage::{Storage, WriteSet},
};
use std::sync::Arc;

/// Guards creates and deletes against dangling references
#[derive(Clone)]
pub struct IntegrityValidator {
    storage: Arc<dyn Storage>,
    index: IndexManager,
}

impl IntegrityValidator {
    /// Create a validator over the given storage and index manager
    pub fn new(storage: Arc<dyn Storage>, index: IndexManager) -> Self {
        Self { storage, index }
    }

    /// Check whether any record of `kind` exists under `id`
    pub fn record_exists(&self, kind: EntityKind, id: &str) -> Result<bool> {
        Ok(self.storage.get(&kind.key(id)?)?.is_some())
    }

    /// Fail with `DependencyMissing` on the first absent parent
    pub fn check_parents<E: Entity>(&self, entity: &E) -> Result<()> {
        for (kind, id) in entity.parents() {
            if !self.record_exists(kind, &id)? {
                tracing::debug!(
                    kind = %E::KIND,
                    id = %entity.id(),
                    parent_kind = %kind,
                    parent_id = %id,
                    "Create rejected: parent missing"
                );
                return Err(Error::DependencyMissing { kind, id });
            }
        }
        Ok(())
    }

    /// Fail with `InUse` if anything still references the record
    pub fn check_dependents<E: Entity>(&self, id: &str) -> Result<()> {
        let mut dependents = Vec::new();

        for index in E::DEPENDENT_INDEXES {
            dependents.extend(self.index.children(*index, id)?);
        }

        for kind in E::DEPENDENT_RECORDS {
            if self.record_exists(*kind, id)? {
                dependents.push(format!("{} {}", kind, id));
            }
        }

        if dependents.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            kind = %E::KIND,
            id = %id,
            dependents = ?dependents,
            "Delete rejected: record in use"
        );

        Err(Error::InUse {
            kind: E::KIND,
            id: id.to_string(),
            dependents,
        })
    }

    /// Guarded create: existence, shape and parents checked, then the
    /// record and its relationship records are staged
    pub fn create<E: Entity>(
        &self,
        repo: &Repository<E>,
        writes: &mut WriteSet,
        entity: &E,
    ) -> Result<()> {
        let id = entity.id();
        if repo.exists(&id)? {
            return Err(Error::AlreadyExists { kind: E::KIND, id });
        }
        entity.validate()?;
        self.check_parents(entity)?;

        repo.create(writes, entity)?;
        for entry in entity.index_entries() {
            self.index.add_relation(writes, &entry)?;
        }

        Ok(())
    }

    /// Guarded delete: dependents checked, then the record and the
    /// relationship records it owns are staged for removal
    pub fn delete<E: Entity>(
        &self,
        repo: &Repository<E>,
        writes: &mut WriteSet,
        id: &str,
    ) -> Result<E> {
        if !repo.exists(id)? {
            return Err(Error::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            });
        }
        self.check_dependents::<E>(id)?;

        let removed = repo.delete(writes, id)?;
        for entry in removed.index_entries() {
            let parts: Vec<&str> = entry.parts.iter().map(String::as_str).collect();
            self.index.remove_relation(writes, entry.index, &parts)?;
        }

        Ok(removed)
    }
}
