//! Ledger adapter
//!
//! The registry only needs a byte-string key/value store with prefix scans
//! and an atomic multi-key write. [`Storage`] is that contract;
//! [`RocksStorage`] implements it on RocksDB and
//! [`MemoryStorage`](crate::memory::MemoryStorage) in memory.
//!
//! # Column Families
//!
//! - `world_state` - Primary records and relationship records, keyed by
//!   composite key (see [`crate::key`])

use crate::{
    config::Config,
    error::{Error, Result},
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_WORLD_STATE: &str = "world_state";

/// Iterator over `(key, value)` pairs returned by a prefix scan
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a>;

/// A single staged write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or overwrite a key
    Put {
        /// Ledger key
        key: Vec<u8>,
        /// Encoded value
        value: Vec<u8>,
    },
    /// Remove a key (no-op if absent)
    Delete {
        /// Ledger key
        key: Vec<u8>,
    },
}

/// Writes staged by one operation and committed together
///
/// Mutations apply in insertion order, so a later write to the same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    mutations: Vec<Mutation>,
}

impl WriteSet {
    /// Empty write set
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.mutations.push(Mutation::Put { key, value });
    }

    /// Stage a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.mutations.push(Mutation::Delete { key });
    }

    /// Number of staged mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// True when nothing is staged
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Staged mutations in order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Consume into the staged mutations
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Ledger adapter contract
///
/// Reads observe committed state only; writes staged in a [`WriteSet`]
/// become visible together when [`Storage::commit`] returns.
pub trait Storage: Send + Sync {
    /// Read a value
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order
    ///
    /// The iterator observes one consistent view of the store.
    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Result<KvIter<'a>>;

    /// Apply every staged mutation atomically
    fn commit(&self, writes: WriteSet) -> Result<()>;

    /// Write a single key
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut writes = WriteSet::new();
        writes.put(key.to_vec(), value.to_vec());
        self.commit(writes)
    }

    /// Remove a single key
    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut writes = WriteSet::new();
        writes.delete(key.to_vec());
        self.commit(writes)
    }
}

/// RocksDB-backed ledger adapter
pub struct RocksStorage {
    db: Arc<DB>,
}

impl RocksStorage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Point lookups and short prefix scans dominate; level compaction keeps reads cheap
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_WORLD_STATE,
            Self::cf_options_world_state(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_family = CF_WORLD_STATE,
            "Opened RocksDB world state"
        );

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_world_state() -> Options {
        let mut opts = Options::default();
        // Records are read far more often than written
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Existence checks benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_WORLD_STATE)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_WORLD_STATE)))
    }

    /// Approximate number of keys in the world state
    pub fn approximate_count(&self) -> Result<u64> {
        let cf = self.cf_handle()?;
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl Storage for RocksStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle()?;
        Ok(self.db.get_cf(cf, key)?)
    }

    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Result<KvIter<'a>> {
        let cf = self.cf_handle()?;
        let owned_prefix = prefix.to_vec();

        // A RocksDB iterator pins the sequence number it was created at,
        // so the whole scan sees a single view.
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
            .map(|item| {
                item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                    .map_err(Error::from)
            })
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(&owned_prefix),
                Err(_) => true,
            });

        Ok(Box::new(iter))
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let cf = self.cf_handle()?;
        let count = writes.len();
        let mut batch = WriteBatch::default();

        for mutation in writes.into_mutations() {
            match mutation {
                Mutation::Put { key, value } => batch.put_cf(cf, key, value),
                Mutation::Delete { key } => batch.delete_cf(cf, key),
            }
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(mutations = count, "World state batch committed");

        Ok(())
    }
}
