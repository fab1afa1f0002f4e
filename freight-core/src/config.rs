//! Configuration for the registry

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Which ledger adapter to open
    pub storage: StorageBackend,

    /// Bounded mailbox size of the command actor
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Train id layout
    pub train_id: TrainIdConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/freight"),
            service_name: "freight-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageBackend::RocksDb,
            mailbox_capacity: 1024,
            rocksdb: RocksDBConfig::default(),
            train_id: TrainIdConfig::default(),
        }
    }
}

/// Ledger adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Volatile, for tests and tooling
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

impl std::str::FromStr for StorageBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" | "rocks_db" => Ok(StorageBackend::RocksDb),
            other => Err(crate::Error::Config(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            target_file_size_mb: 64,
            max_background_jobs: 2,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Where the schedule number sits inside a train id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainIdConfig {
    /// Character offset of the schedule number
    pub schedule_offset: usize,

    /// Length of the schedule number in characters
    pub schedule_len: usize,
}

impl Default for TrainIdConfig {
    fn default() -> Self {
        Self {
            schedule_offset: 8,
            schedule_len: 4,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML document; missing keys take their defaults
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("FREIGHT_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("FREIGHT_STORAGE_BACKEND") {
            config.storage = backend.parse()?;
        }

        if let Ok(capacity) = std::env::var("FREIGHT_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid FREIGHT_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "freight-core");
        assert_eq!(config.storage, StorageBackend::RocksDb);
        assert_eq!(config.train_id.schedule_offset, 8);
        assert_eq!(config.train_id.schedule_len, 4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            storage = "memory"

            [train_id]
            schedule_offset = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.train_id.schedule_offset, 2);
        assert_eq!(config.train_id.schedule_len, 4);
        assert_eq!(config.mailbox_capacity, 1024);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            Config::from_toml("storage = 5"),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("rocksdb".parse::<StorageBackend>().unwrap(), StorageBackend::RocksDb);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
