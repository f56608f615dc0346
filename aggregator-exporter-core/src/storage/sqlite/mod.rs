//! SQLite storage backend.
//!
//! # Module Structure
//! - `decode`: Decoding of SQLite row values into scan slots
//!
//! # SQLite-Specific Behavior
//! - Tables are listed from `sqlite_master`, skipping internal `sqlite_*` tables
//! - Column type names are the declared types (`INTEGER`, `TEXT`, ...), so
//!   most columns read through the textual slot
//! - A single pooled connection is enough; `:memory:` data sources share it

pub mod decode;

use super::{
    DISABLED_RULES_QUERY, Storage, column_descriptors, count_sql, probe_sql, select_all_sql,
    table_names,
};
use crate::config::StorageConfiguration;
use crate::models::{ColumnDescriptor, DbDriver, DisabledRuleRecord, TableName};
use crate::scan::{Row, materialize_row};
use crate::{ExporterError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Column, ConnectOptions, Executor, SqlitePool, Statement, TypeInfo};
use std::str::FromStr;

const LIST_OF_TABLES_QUERY: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";

/// SQLite backend over a single-connection pool.
pub struct SqliteStorage {
    pool: SqlitePool,
    data_source: String,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("data_source", &self.data_source)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Creates a backend for `sqlite_datasource`.
    ///
    /// Accepts a file path, `sqlite://path`, `:memory:` or `sqlite::memory:`.
    /// The connection is opened on first use.
    ///
    /// # Errors
    /// Returns a configuration error if the data source cannot be parsed.
    pub fn new(config: &StorageConfiguration) -> Result<Self> {
        let data_source = config.sqlite_datasource.clone();
        if data_source.is_empty() {
            return Err(ExporterError::configuration(
                "sqlite_datasource must be set when db_driver is sqlite3",
            ));
        }

        tracing::info!(
            driver = "sqlite3",
            datasource = %data_source,
            "Making connection to data storage"
        );

        let mut options = SqliteConnectOptions::from_str(&data_source).map_err(|e| {
            ExporterError::configuration(format!(
                "Invalid SQLite data source '{}': {}",
                data_source, e
            ))
        })?;
        if !config.log_sql_queries {
            options = options.disable_statement_logging();
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);

        Ok(Self { pool, data_source })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            data_source: "<pool>".to_string(),
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn read_list_of_tables(&self) -> Result<Vec<TableName>> {
        let names: Vec<String> = sqlx::query_scalar(LIST_OF_TABLES_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExporterError::query_failed("Failed to read list of tables", e))?;

        table_names(names)
    }

    async fn describe_columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>> {
        let sql = probe_sql(table);
        let statement = self.pool.prepare(&sql).await.map_err(|e| {
            ExporterError::query_failed(format!("Failed to describe table '{}'", table), e)
        })?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| ColumnDescriptor::new(column.name(), column.type_info().name()))
            .collect();

        column_descriptors(table, columns)
    }

    async fn read_rows(
        &self,
        table: &TableName,
        columns: &[ColumnDescriptor],
        limit: Option<u32>,
    ) -> Result<Vec<Row>> {
        let sql = select_all_sql(table, limit);
        tracing::debug!(table = %table, query = %sql, "Reading table content");

        let mut stream = sqlx::query(&sql).fetch(&self.pool);
        let mut rows = Vec::new();
        while let Some(row) = stream.try_next().await.map_err(|e| {
            ExporterError::query_failed(format!("Failed to read rows of table '{}'", table), e)
        })? {
            rows.push(materialize_row(&row, table.as_str(), columns)?);
        }

        Ok(rows)
    }

    async fn read_records_count(&self, table: &TableName) -> Result<i64> {
        sqlx::query_scalar(&count_sql(table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                ExporterError::query_failed(format!("Failed to count records in '{}'", table), e)
            })
    }

    async fn read_disabled_rules(&self) -> Result<Vec<DisabledRuleRecord>> {
        let records: Vec<(String, i64)> = sqlx::query_as(DISABLED_RULES_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExporterError::query_failed("Failed to read disabled rules", e))?;

        Ok(records
            .into_iter()
            .map(|(rule, count)| DisabledRuleRecord { rule, count })
            .collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DbDriver {
        DbDriver::SQLite
    }
}
