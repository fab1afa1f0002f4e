//! Registry orchestration layer
//!
//! Ties storage, indexes, integrity checks, capacity accounting and manifest
//! aggregation together into the operations callers use. Every operation
//! validates first, stages its writes into one [`WriteSet`] and commits it
//! through a single ledger write; `create_waybill` is the only operation that
//! commits twice and it compensates through a [`Saga`].
//!
//! # Example
//!
//! ```no_run
//! use freight_core::{config::StorageBackend, Config, Registry};
//!
//! fn main() -> freight_core::Result<()> {
//!     let mut config = Config::default();
//!     config.storage = StorageBackend::Memory;
//!     let registry = Registry::open(config)?;
//!
//!     registry.create_train("G20210120007", 10)?;
//!     let train = registry.reserve_capacity("G20210120007", 4)?;
//!     assert_eq!(train.remaining_capacity, 6);
//!     Ok(())
//! }
//! ```

use crate::{
    capacity::CapacityAccountant,
    config::{Config, StorageBackend},
    error::{Error, Result},
    index::IndexManager,
    integrity::IntegrityValidator,
    key::{EntityKind, IndexKind},
    manifest::ManifestAggregator,
    memory::MemoryStorage,
    metrics::Metrics,
    repository::{Entity, Repository},
    saga::Saga,
    storage::{RocksStorage, Storage, WriteSet},
    types::{
        Cargo, Line, Order, OrderRequest, Schedule, Station, StationRole, Train, Vehicle, WayBill,
    },
    waybill::{Movement, RouteResolver},
};
use chrono::Utc;
use std::sync::Arc;

/// Freight registry
///
/// Each operation is a read-check-write sequence that assumes it is the only
/// writer. To share one registry between tasks or threads, hand it to
/// [`spawn_registry_actor`](crate::actor::spawn_registry_actor) and use the
/// returned handle; calling clones of the same registry concurrently can
/// over-allocate train capacity.
#[derive(Clone)]
pub struct Registry {
    storage: Arc<dyn Storage>,
    index: IndexManager,
    integrity: IntegrityValidator,
    capacity: CapacityAccountant,
    manifest: ManifestAggregator,
    routes: RouteResolver,
    metrics: Metrics,
    config: Config,
}

impl Registry {
    /// Open the storage backend named in the configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = match config.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::RocksDb => Arc::new(RocksStorage::open(&config)?),
        };
        Self::new(storage, config)
    }

    /// Build a registry over an already opened ledger
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Result<Self> {
        let index = IndexManager::new(storage.clone());
        let integrity = IntegrityValidator::new(storage.clone(), index.clone());
        let capacity = CapacityAccountant::new(Repository::new(storage.clone()));
        let manifest = ManifestAggregator::new(index.clone(), Repository::new(storage.clone()));
        let routes = RouteResolver::new(
            Repository::new(storage.clone()),
            Repository::new(storage.clone()),
            config.train_id.clone(),
        );
        let metrics = Metrics::new()?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            backend = ?config.storage,
            "Registry opened"
        );

        Ok(Self {
            storage,
            index,
            integrity,
            capacity,
            manifest,
            routes,
            metrics,
            config,
        })
    }

    /// Configuration the registry was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operation counters
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn repo<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.storage.clone())
    }

    fn observe<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        self.metrics.record(operation, &result);
        if let Err(err) = &result {
            tracing::debug!(operation, error = %err, "Operation rejected");
        }
        result
    }

    fn insert<E: Entity>(&self, entity: E) -> Result<E> {
        let mut writes = WriteSet::new();
        self.integrity.create(&self.repo::<E>(), &mut writes, &entity)?;
        self.storage.commit(writes)?;
        tracing::info!(kind = %E::KIND, id = %entity.id(), "Record created");
        Ok(entity)
    }

    // ----- generic record access -----

    /// Check whether a record exists
    pub fn exists<E: Entity>(&self, id: &str) -> Result<bool> {
        self.repo::<E>().exists(id)
    }

    /// Load a record
    pub fn get<E: Entity>(&self, id: &str) -> Result<E> {
        self.repo::<E>().get(id)
    }

    /// Every record of one kind in key order
    pub fn list_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.repo::<E>().list_all()
    }

    /// Delete a record that nothing references, together with the
    /// relationship records it owns
    pub fn delete<E: Entity>(&self, id: &str) -> Result<E> {
        let result = (|| -> Result<E> {
            let mut writes = WriteSet::new();
            let removed = self.integrity.delete(&self.repo::<E>(), &mut writes, id)?;
            self.storage.commit(writes)?;
            tracing::info!(kind = %E::KIND, id = %id, "Record deleted");
            Ok(removed)
        })();
        self.observe(&format!("delete_{}", E::KIND), result)
    }

    /// Replace a record with the output of `mutator`
    ///
    /// The id and the owned relationship records must stay the same, and the
    /// change must pass the kind's [`Entity::check_update`] rules (no
    /// restock, orders only reviewed, manifests and waybills only appended).
    /// Rejected mutations write nothing.
    pub fn update<E, F>(&self, id: &str, mutator: F) -> Result<E>
    where
        E: Entity,
        F: FnOnce(&mut E) -> Result<()>,
    {
        let result = (|| -> Result<E> {
            let mut writes = WriteSet::new();
            let updated = self.repo::<E>().update(&mut writes, id, mutator)?;
            self.storage.commit(writes)?;
            tracing::info!(kind = %E::KIND, id = %id, "Record updated");
            Ok(updated)
        })();
        self.observe(&format!("update_{}", E::KIND), result)
    }

    /// Ids of the children related to `parent_id` through `index`
    pub fn related(&self, index: IndexKind, parent_id: &str) -> Result<Vec<String>> {
        self.index.children(index, parent_id)
    }

    // ----- catalog -----

    /// Register a vehicle in service
    pub fn create_vehicle(&self, id: u32, carriage_count: u32) -> Result<Vehicle> {
        let result = self.insert(Vehicle {
            id,
            carriage_count,
            active: true,
        });
        self.observe("create_vehicle", result)
    }

    /// Register a station in service
    pub fn create_station(
        &self,
        name: impl Into<String>,
        country: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Station> {
        let result = self.insert(Station {
            name: name.into(),
            country: country.into(),
            active: true,
            description: description.into(),
        });
        self.observe("create_station", result)
    }

    /// Register a line; every station must already exist
    pub fn create_line(
        &self,
        id: u32,
        stations: Vec<String>,
        roles: Vec<StationRole>,
    ) -> Result<Line> {
        let result = self.insert(Line {
            id,
            stations,
            roles,
            active: true,
        });
        self.observe("create_line", result)
    }

    /// Register a schedule; its line and vehicle must already exist
    pub fn create_schedule(
        &self,
        id: u32,
        line_id: u32,
        vehicle_id: u32,
        unit_price: u32,
    ) -> Result<Schedule> {
        let result = self.insert(Schedule {
            id,
            line_id,
            vehicle_id,
            unit_price,
            active: true,
        });
        self.observe("create_schedule", result)
    }

    /// Register a train with `capacity` units to sell
    pub fn create_train(&self, id: impl Into<String>, capacity: u32) -> Result<Train> {
        let result = self.insert(Train {
            id: id.into(),
            remaining_capacity: capacity,
        });
        self.observe("create_train", result)
    }

    // ----- orders and capacity -----

    /// Reserve capacity on a train without placing an order
    pub fn reserve_capacity(&self, train_id: &str, requested: u32) -> Result<Train> {
        let result = (|| -> Result<Train> {
            let mut writes = WriteSet::new();
            let train = self.capacity.reserve(&mut writes, train_id, requested)?;
            self.storage.commit(writes)?;
            self.metrics.capacity_reserved.inc_by(u64::from(requested));
            tracing::info!(
                train_id = %train_id,
                requested,
                remaining = train.remaining_capacity,
                "Capacity reserved"
            );
            Ok(train)
        })();
        self.observe("reserve_capacity", result)
    }

    /// Place an order, reserving its capacity on the train
    ///
    /// The decremented train, the order and its `train~order` entry commit
    /// together; on any failure nothing is written.
    pub fn create_order(&self, request: OrderRequest) -> Result<Order> {
        let result = self.place_order(request);
        self.observe("create_order", result)
    }

    fn place_order(&self, request: OrderRequest) -> Result<Order> {
        let orders = self.repo::<Order>();
        let id = request.id.to_string();
        if orders.exists(&id)? {
            return Err(Error::AlreadyExists {
                kind: EntityKind::Order,
                id,
            });
        }
        if !self.repo::<Train>().exists(&request.train_id)? {
            return Err(Error::DependencyMissing {
                kind: EntityKind::Train,
                id: request.train_id,
            });
        }

        let order = Order::from_request(request, Utc::now().date_naive());

        let mut writes = WriteSet::new();
        let train = self
            .capacity
            .reserve(&mut writes, &order.train_id, order.reserved_capacity)?;
        self.integrity.create(&orders, &mut writes, &order)?;
        self.storage.commit(writes)?;

        self.metrics
            .capacity_reserved
            .inc_by(u64::from(order.reserved_capacity));
        tracing::info!(
            order_id = order.id,
            train_id = %order.train_id,
            reserved = order.reserved_capacity,
            remaining = train.remaining_capacity,
            "Order placed"
        );

        Ok(order)
    }

    /// Record the inspection verdict on an order
    pub fn update_order(&self, id: u32, approved: bool, note: impl Into<String>) -> Result<Order> {
        let note = note.into();
        let result = (|| -> Result<Order> {
            let mut writes = WriteSet::new();
            let order = self.repo::<Order>().update(&mut writes, &id.to_string(), |order| {
                order.approved = approved;
                order.approval_note = note;
                Ok(())
            })?;
            self.storage.commit(writes)?;
            tracing::info!(order_id = id, approved, "Order reviewed");
            Ok(order)
        })();
        self.observe("update_order", result)
    }

    // ----- manifests and waybills -----

    /// Derive and persist the cargo manifest of a train
    pub fn create_cargo(&self, train_id: &str) -> Result<Cargo> {
        let result = self.build_cargo(train_id);
        self.observe("create_cargo", result)
    }

    fn build_cargo(&self, train_id: &str) -> Result<Cargo> {
        let cargoes = self.repo::<Cargo>();
        if cargoes.exists(train_id)? {
            return Err(Error::AlreadyExists {
                kind: EntityKind::Cargo,
                id: train_id.to_string(),
            });
        }
        if !self.repo::<Train>().exists(train_id)? {
            return Err(Error::DependencyMissing {
                kind: EntityKind::Train,
                id: train_id.to_string(),
            });
        }

        let cargo = self.manifest.aggregate(train_id)?;

        let mut writes = WriteSet::new();
        self.integrity.create(&cargoes, &mut writes, &cargo)?;
        self.storage.commit(writes)?;

        tracing::info!(
            train_id = %train_id,
            orders = cargo.order_ids.len(),
            items = cargo.total_items,
            "Cargo manifest created"
        );

        Ok(cargo)
    }

    /// Append one inspection result to a train's manifest
    pub fn update_cargo(
        &self,
        train_id: &str,
        passed: bool,
        note: impl Into<String>,
    ) -> Result<Cargo> {
        let note = note.into();
        let result = (|| -> Result<Cargo> {
            let mut writes = WriteSet::new();
            let cargo = self.repo::<Cargo>().update(&mut writes, train_id, |cargo| {
                ManifestAggregator::record_inspection(cargo, passed, note);
                Ok(())
            })?;
            self.storage.commit(writes)?;
            tracing::info!(train_id = %train_id, passed, "Cargo inspected");
            Ok(cargo)
        })();
        self.observe("update_cargo", result)
    }

    /// Create the manifest and the waybill of a train
    ///
    /// The manifest is committed first; if the waybill cannot be created the
    /// manifest is deleted again before the error is returned.
    pub fn create_waybill(&self, train_id: &str) -> Result<WayBill> {
        let result = self.issue_waybill(train_id);
        if let Err(Error::CompensationFailed { .. }) = &result {
            self.metrics.compensation_failures.inc();
        }
        self.observe("create_waybill", result)
    }

    fn issue_waybill(&self, train_id: &str) -> Result<WayBill> {
        self.build_cargo(train_id)?;

        let mut saga = Saga::new("create_waybill");
        let cargoes = self.repo::<Cargo>();
        let storage = self.storage.clone();
        let cargo_id = train_id.to_string();
        saga.record("delete cargo", move || {
            let mut writes = WriteSet::new();
            cargoes.delete(&mut writes, &cargo_id)?;
            storage.commit(writes)
        });
        tracing::debug!(
            saga_id = %saga.id(),
            train_id = %train_id,
            "Cargo committed, creating waybill"
        );

        match saga.run(|| self.stage_waybill(train_id)) {
            Ok((waybill, saga)) => {
                saga.complete();
                Ok(waybill)
            }
            Err(err) => {
                self.metrics.compensations.inc();
                Err(err)
            }
        }
    }

    fn stage_waybill(&self, train_id: &str) -> Result<WayBill> {
        let waybills = self.repo::<WayBill>();
        if waybills.exists(train_id)? {
            return Err(Error::AlreadyExists {
                kind: EntityKind::WayBill,
                id: train_id.to_string(),
            });
        }
        if !self.repo::<Train>().exists(train_id)? {
            return Err(Error::DependencyMissing {
                kind: EntityKind::Train,
                id: train_id.to_string(),
            });
        }

        let line = self.routes.resolve(train_id)?;
        let waybill = RouteResolver::new_waybill(train_id, &line);

        let mut writes = WriteSet::new();
        self.integrity.create(&waybills, &mut writes, &waybill)?;
        self.storage.commit(writes)?;

        tracing::info!(
            train_id = %train_id,
            line_id = line.id,
            stops = waybill.route.len(),
            "Waybill created"
        );

        Ok(waybill)
    }

    /// Record a position report on a train's waybill
    pub fn update_waybill(&self, train_id: &str, movement: Movement) -> Result<WayBill> {
        let result = (|| -> Result<WayBill> {
            let mut writes = WriteSet::new();
            let waybill = self.repo::<WayBill>().update(&mut writes, train_id, |waybill| {
                movement.apply(waybill);
                Ok(())
            })?;
            self.storage.commit(writes)?;
            tracing::info!(
                train_id = %train_id,
                position = waybill.position,
                in_station = waybill.in_station,
                "Waybill updated"
            );
            Ok(waybill)
        })();
        self.observe("update_waybill", result)
    }
}
