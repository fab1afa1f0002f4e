//! Error types for the freight registry

use crate::key::EntityKind;
use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Registry errors
#[derive(Error, Debug)]
pub enum Error {
    /// A record with this id is already present
    #[error("the {kind} {id} already exists")]
    AlreadyExists {
        /// Entity kind
        kind: EntityKind,
        /// Entity id
        id: String,
    },

    /// The addressed record is absent
    #[error("the {kind} {id} does not exist")]
    NotFound {
        /// Entity kind
        kind: EntityKind,
        /// Entity id
        id: String,
    },

    /// A parent record required by a create is absent
    #[error("the {kind} {id} referenced by this record does not exist")]
    DependencyMissing {
        /// Parent kind
        kind: EntityKind,
        /// Parent id
        id: String,
    },

    /// Delete blocked by dependent records
    #[error("the {kind} {id} is used by {}", .dependents.join(" "))]
    InUse {
        /// Kind of the record being deleted
        kind: EntityKind,
        /// Id of the record being deleted
        id: String,
        /// Ids of the records that still reference it
        dependents: Vec<String>,
    },

    /// Reservation exceeds the train's remaining capacity
    #[error("the train {train_id}'s capacity is not enough: {remaining} left, {requested} asked")]
    InsufficientCapacity {
        /// Train id
        train_id: String,
        /// Capacity left on the train
        remaining: u32,
        /// Capacity asked for
        requested: u32,
    },

    /// The schedule number could not be read out of a train id
    #[error("malformed train id {train_id}: {reason}")]
    MalformedTrainId {
        /// Offending train id
        train_id: String,
        /// What went wrong
        reason: String,
    },

    /// Composite key could not be built or split
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Record violates a shape invariant
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A compensating step of a saga failed after a forward step failed
    #[error("compensation '{step}' failed ({compensation}) while undoing: {source}")]
    CompensationFailed {
        /// Label of the compensation that failed
        step: String,
        /// The forward failure that triggered compensation
        source: Box<Error>,
        /// The failure of the compensation itself
        compensation: Box<Error>,
    },

    /// Storage error (RocksDB or in-memory adapter)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// Short machine-readable name of the error kind, used as a metrics label
    pub fn kind_label(&self) -> &'static str {
        match self {
            Error::AlreadyExists { .. } => "already_exists",
            Error::NotFound { .. } => "not_found",
            Error::DependencyMissing { .. } => "dependency_missing",
            Error::InUse { .. } => "in_use",
            Error::InsufficientCapacity { .. } => "insufficient_capacity",
            Error::MalformedTrainId { .. } => "malformed_train_id",
            Error::InvalidKey(_) => "invalid_key",
            Error::InvalidRecord(_) => "invalid_record",
            Error::CompensationFailed { .. } => "compensation_failed",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }
}
