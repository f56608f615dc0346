//! Core library for the aggregator exporter.
//!
//! This crate reads every table of a PostgreSQL or SQLite database and
//! writes it as CSV, to a local directory or an S3-compatible bucket,
//! together with a few aggregate artifacts (table list, record counts,
//! disabled rules, and the run's own log).
//!
//! # Architecture
//! - `storage`: database backends behind the [`Storage`] trait, created by
//!   a factory from the configured driver
//! - `scan`: schema-agnostic decoding of rows into typed scan slots
//! - `export`: CSV projection of tables and aggregates into any `Write` sink
//! - `output`: directory and S3 destinations for the produced artifacts
//! - `exporter`: the full export run
//!
//! # Guarantees
//! - All database operations are read-only
//! - Column order is captured once per table and drives the header and
//!   every data record
//! - Connection credentials are redacted before reaching logs or errors

pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod logging;
pub mod models;
pub mod output;
pub mod scan;
pub mod storage;

// Re-export commonly used types
pub use config::{ExporterConfig, LoggingConfiguration, S3Configuration, StorageConfiguration};
pub use error::{ExporterError, Result};
pub use exporter::{ExportOptions, ExportSummary, TableExport, perform_data_export};
pub use logging::{LogCapture, init_logging};
pub use models::{ColumnDescriptor, DbDriver, DisabledRuleRecord, TableName};
pub use output::{ExportSink, ExportTarget, OutputMode, S3Store};
pub use scan::{Row, ScanKind, ScanSlot, Value, scan_kind_for};
pub use storage::{Storage, create_storage};
