//! Storage backends the exporter reads from.
//!
//! This module defines the [`Storage`] trait that each database backend
//! implements, plus the factory that picks a backend from the configured
//! driver name.
//!
//! # Module Structure
//! - `postgres`: PostgreSQL backend (feature `postgresql`)
//! - `sqlite`: SQLite backend (feature `sqlite`)
//!
//! # Resource Handling
//! Backends hold a lazily connected `sqlx` pool. Connections are scoped:
//! every probe, query and cursor returns its connection to the pool when
//! dropped, on success and on error alike.

use crate::config::StorageConfiguration;
use crate::models::{ColumnDescriptor, DbDriver, DisabledRuleRecord, TableName};
use crate::scan::Row;
use crate::{ExporterError, Result};
use async_trait::async_trait;

#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Rules disabled by more than one user, most disabled first.
pub const DISABLED_RULES_QUERY: &str = "SELECT rule_id, count(rule_id) AS rule_count FROM rule_disable GROUP BY rule_id HAVING count(rule_id)>1 ORDER BY rule_count DESC";

/// Read-only access to the database being exported.
///
/// # Object Safety
/// The trait is object-safe; the factory hands out `Box<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Lists user tables in catalog order.
    async fn read_list_of_tables(&self) -> Result<Vec<TableName>>;

    /// Discovers column names and driver type names for a table.
    ///
    /// # Errors
    /// - `Query` if the probe statement cannot be prepared
    /// - `Metadata` if the driver reports no result columns
    async fn describe_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>>;

    /// Reads table rows decoded against the given column list.
    ///
    /// `None` and `Some(0)` read the whole table.
    ///
    /// # Errors
    /// - `Query` if the statement fails
    /// - `Scan` on the first row that cannot be decoded
    async fn read_rows(
        &self,
        table: &TableName,
        columns: &[ColumnDescriptor],
        limit: Option<u32>,
    ) -> Result<Vec<Row>>;

    /// Counts the records stored in a table.
    async fn read_records_count(&self, table: &TableName) -> Result<i64>;

    /// Reads rules disabled by more than one user.
    async fn read_disabled_rules(&self) -> Result<Vec<DisabledRuleRecord>>;

    /// Closes the connection pool.
    async fn close(&self);

    /// Returns the driver this backend handles.
    fn driver(&self) -> DbDriver;
}

/// Creates the storage backend selected by `db_driver`.
///
/// No connection is opened here; the first query connects.
///
/// # Errors
/// Returns a configuration error for unsupported drivers or malformed
/// connection settings.
pub fn create_storage(config: &StorageConfiguration) -> Result<Box<dyn Storage>> {
    let driver: DbDriver = config.db_driver.parse()?;

    match driver {
        #[cfg(feature = "postgresql")]
        DbDriver::PostgreSQL => Ok(Box::new(postgres::PostgresStorage::new(config)?)),
        #[cfg(not(feature = "postgresql"))]
        DbDriver::PostgreSQL => Err(ExporterError::configuration(
            "PostgreSQL support is not compiled in; rebuild with --features postgresql",
        )),
        #[cfg(feature = "sqlite")]
        DbDriver::SQLite => Ok(Box::new(sqlite::SqliteStorage::new(config)?)),
        #[cfg(not(feature = "sqlite"))]
        DbDriver::SQLite => Err(ExporterError::configuration(
            "SQLite support is not compiled in; rebuild with --features sqlite",
        )),
    }
}

/// Probe statement whose result descriptor gives a table's columns.
pub(crate) fn probe_sql(table: &TableName) -> String {
    format!("SELECT * FROM {} LIMIT 1", table.quoted())
}

/// Full table read, bounded only when `limit` is positive.
pub(crate) fn select_all_sql(table: &TableName, limit: Option<u32>) -> String {
    select_sql("*", table, limit)
}

/// Like [`select_all_sql`] with an explicit select list.
pub(crate) fn select_sql(select_list: &str, table: &TableName, limit: Option<u32>) -> String {
    match limit {
        Some(limit) if limit > 0 => format!(
            "SELECT {} FROM {} LIMIT {}",
            select_list,
            table.quoted(),
            limit
        ),
        _ => format!("SELECT {} FROM {}", select_list, table.quoted()),
    }
}

pub(crate) fn count_sql(table: &TableName) -> String {
    format!("SELECT count(*) FROM {}", table.quoted())
}

/// Validates the column list reported for a probe.
pub(crate) fn column_descriptors(
    table: &TableName,
    columns: Vec<ColumnDescriptor>,
) -> Result<Vec<ColumnDescriptor>> {
    if columns.is_empty() {
        return Err(ExporterError::metadata_unavailable(format!(
            "no result columns reported for table '{}'",
            table
        )));
    }
    tracing::debug!(table = %table, columns = columns.len(), "Described table columns");
    Ok(columns)
}

pub(crate) fn table_names(names: Vec<String>) -> Result<Vec<TableName>> {
    names.into_iter().map(TableName::new).collect()
}
