//! Freight Registry Core
//!
//! Rail freight records (vehicles, stations, lines, schedules, trains,
//! orders, cargo manifests, waybills) kept on a plain key/value ledger, with
//! relational integrity maintained by the crate instead of a database.
//!
//! # Architecture
//!
//! - **Composite keys**: every record and relationship lives under a
//!   `0x00 kind 0x00 part 0x00 …` key, so "who references X" is a prefix scan
//! - **Secondary indexes**: `station~line`, `line~schedule`,
//!   `vehicle~schedule` and `train~order` entries written with their child
//! - **Integrity guards**: creates require parents, deletes require no
//!   dependents
//! - **Single Writer**: one actor task serializes commands
//!
//! # Invariants
//!
//! - Every index entry names two existing records
//! - Train capacity only decreases and never goes below zero
//! - A manifest holds exactly the items of the orders approved when it was built
//! - An operation's writes become visible together or not at all

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod capacity;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod key;
pub mod manifest;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod repository;
pub mod response;
pub mod saga;
pub mod storage;
pub mod types;
pub mod waybill;

// Re-exports
pub use actor::{spawn_registry_actor, RegistryHandle};
pub use config::Config;
pub use error::{Error, Result};
pub use key::{EntityKind, IndexKind};
pub use memory::MemoryStorage;
pub use registry::Registry;
pub use repository::{Entity, Repository};
pub use response::{OpResult, QueryResult};
pub use storage::{RocksStorage, Storage, WriteSet};
pub use types::{
    Cargo, CargoItem, Line, Order, OrderRequest, Schedule, Station, StationRole, Train, Vehicle,
    WayBill,
};
pub use waybill::Movement;
