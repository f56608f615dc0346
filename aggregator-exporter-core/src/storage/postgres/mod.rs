//! PostgreSQL storage backend.
//!
//! # Module Structure
//! - `connection`: Connection URL assembly and lazy pool creation
//! - `decode`: Decoding of PostgreSQL row values into scan slots
//!
//! Table names come from `pg_catalog.pg_tables`, excluding the system
//! schemas. Column types are the names PostgreSQL reports for the probe
//! statement (`INT4`, `VARCHAR`, `BOOL`, ...).

pub mod connection;
pub mod decode;

use super::{
    DISABLED_RULES_QUERY, Storage, column_descriptors, count_sql, probe_sql, select_sql,
    table_names,
};
use crate::models::{ColumnDescriptor, DbDriver, DisabledRuleRecord, TableName, quote_identifier};
use crate::scan::{Row, materialize_row};
use crate::{ExporterError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{Column, Executor, PgPool, Statement, TypeInfo};

const LIST_OF_TABLES_QUERY: &str = "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname != 'information_schema' AND schemaname != 'pg_catalog'";

/// PostgreSQL backend over a lazily connected pool.
pub struct PostgresStorage {
    pool: PgPool,
    /// Connection URL with the password masked
    redacted_url: String,
}

impl std::fmt::Debug for PostgresStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("url", &self.redacted_url)
            .finish_non_exhaustive()
    }
}

impl PostgresStorage {
    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            redacted_url: "<pool>".to_string(),
        }
    }
}

/// Select list for a full read.
///
/// Columns whose type has no dedicated decoder are cast to `text` by the
/// server, so every PostgreSQL type reaches the string slot as its textual
/// form.
fn select_list(columns: &[ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(|column| {
            let name = quote_identifier(&column.name);
            if decode::needs_text_cast(&column.database_type_name) {
                format!("{}::text AS {}", name, name)
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Storage for PostgresStorage {
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
        let sql = select_sql(&select_list(columns), table, limit);
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
        DbDriver::PostgreSQL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_list_casts_undecoded_types() {
        let columns = [
            ColumnDescriptor::new("id", "INT4"),
            ColumnDescriptor::new("name", "VARCHAR"),
            ColumnDescriptor::new("price", "NUMERIC"),
            ColumnDescriptor::new("tags", "TEXT[]"),
            ColumnDescriptor::new("payload", "JSONB"),
            ColumnDescriptor::new("created", "TIMESTAMPTZ"),
        ];

        assert_eq!(
            select_list(&columns),
            "\"id\", \"name\", \"price\"::text AS \"price\", \"tags\"::text AS \"tags\", \
             \"payload\"::text AS \"payload\", \"created\""
        );
    }

    #[test]
    fn test_select_list_quotes_awkward_names() {
        let columns = [ColumnDescriptor::new("odd \"name\"", "INTERVAL")];
        assert_eq!(
            select_list(&columns),
            "\"odd \"\"name\"\"\"::text AS \"odd \"\"name\"\"\""
        );
    }
}
