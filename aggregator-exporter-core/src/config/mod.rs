//! Exporter configuration.
//!
//! Configuration has the same shape as the TOML file it is loaded from:
//!
//! ```toml
//! [storage]
//! db_driver = "postgres"
//! pg_username = "postgres"
//! pg_password = "postgres"
//! pg_host = "localhost"
//! pg_port = 5432
//! pg_db_name = "aggregator"
//! pg_params = "sslmode=disable"
//!
//! [s3]
//! type = "minio"
//! endpoint_url = "127.0.0.1"
//! endpoint_port = 9000
//! access_key_id = "foobar"
//! secret_access_key = "foobar"
//! use_ssl = false
//! bucket = "test"
//!
//! [logging]
//! debug = true
//! log_level = "info"
//! ```
//!
//! Every key can be overridden by an environment variable named
//! `INSIGHTS_RESULTS_AGGREGATOR_EXPORTER__<SECTION>__<KEY>`; see
//! [`loader`].

pub mod loader;

pub use loader::{CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE, ENV_PREFIX};

use serde::{Deserialize, Serialize};

/// Whole exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub storage: StorageConfiguration,
    pub s3: S3Configuration,
    pub logging: LoggingConfiguration,
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfiguration {
    /// `postgres` or `sqlite3`
    pub db_driver: String,
    /// SQLite file path or `:memory:`
    pub sqlite_datasource: String,
    pub pg_username: String,
    pub pg_password: String,
    pub pg_host: String,
    pub pg_port: u16,
    pub pg_db_name: String,
    /// Extra connection parameters, e.g. `sslmode=disable`
    pub pg_params: String,
    /// Log every SQL statement sent to the database
    pub log_sql_queries: bool,
}

impl Default for StorageConfiguration {
    fn default() -> Self {
        Self {
            db_driver: "postgres".to_string(),
            sqlite_datasource: String::new(),
            pg_username: String::new(),
            pg_password: String::new(),
            pg_host: "localhost".to_string(),
            pg_port: 5432,
            pg_db_name: "aggregator".to_string(),
            pg_params: String::new(),
            log_sql_queries: false,
        }
    }
}

/// S3 (or MinIO) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Configuration {
    /// Informational storage flavor, e.g. `minio` or `aws`
    pub r#type: String,
    /// Host name or address, without scheme or port
    pub endpoint_url: String,
    pub endpoint_port: u16,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket: String,
    pub region: String,
    /// Prepended to every table artifact name
    pub prefix: String,
}

impl Default for S3Configuration {
    fn default() -> Self {
        Self {
            r#type: "minio".to_string(),
            endpoint_url: "127.0.0.1".to_string(),
            endpoint_port: 9000,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            use_ssl: false,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            prefix: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfiguration {
    /// Human-readable console output instead of JSON lines
    pub debug: bool,
    /// One of `trace`, `debug`, `info`, `warn`/`warning`, `error`, `fatal`
    pub log_level: String,
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.storage.db_driver, "postgres");
        assert_eq!(config.storage.pg_port, 5432);
        assert_eq!(config.s3.region, "us-east-1");
        assert_eq!(config.s3.prefix, "");
        assert_eq!(config.logging.log_level, "info");
        assert!(!config.logging.debug);
    }

    #[test]
    fn test_s3_type_key() {
        let config: ExporterConfig = toml::from_str("[s3]\ntype = \"aws\"\n").unwrap();
        assert_eq!(config.s3.r#type, "aws");

        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("type = \"aws\""));
    }
}
