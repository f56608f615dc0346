//! CSV projection of tables and aggregate metadata.
//!
//! All writers share one format: UTF-8, comma delimiter, double quotes only
//! where a field needs them, `\n` after every record including the last.
//! The first record is always a header.

use crate::models::TableName;
use crate::storage::Storage;
use crate::{ExporterError, Result};
use std::io::Write;

/// Header of the table list artifact.
pub const TABLE_NAMES_HEADER: [&str; 1] = ["Table name"];
/// Header of the record counts artifact.
pub const TABLE_METADATA_HEADER: [&str; 2] = ["Table name", "Records"];
/// Header of the disabled rules artifact.
pub const DISABLED_RULES_HEADER: [&str; 2] = ["Rule", "Count"];

fn csv_writer<W: Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

fn write_record<W, I, T>(writer: &mut csv::Writer<W>, record: I, artifact: &str) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer
        .write_record(record)
        .map_err(|e| ExporterError::write_failed(format!("Failed to write record to {}", artifact), e))
}

fn finish<W: Write>(mut writer: csv::Writer<W>, artifact: &str) -> Result<()> {
    writer
        .flush()
        .map_err(|e| ExporterError::write_failed(format!("Failed to flush {}", artifact), e))
}

/// Writes one table as CSV: header plus one record per row.
///
/// Columns are discovered once and the same list drives the header and
/// every data record. Nothing is written when the table cannot be
/// described.
///
/// # Returns
/// Number of data rows written.
///
/// # Errors
/// - `Query` or `Metadata` if the table cannot be described
/// - `Query` or `Scan` if its rows cannot be read
/// - `Write` if the sink rejects data
pub async fn project_table<W: Write>(
    sink: &mut W,
    storage: &dyn Storage,
    table: &TableName,
    limit: Option<u32>,
) -> Result<usize> {
    let columns = storage.describe_columns(table).await?;

    let mut writer = csv_writer(sink);
    write_record(
        &mut writer,
        columns.iter().map(|column| column.name.as_str()),
        table.as_str(),
    )?;

    let rows = storage.read_rows(table, &columns, limit).await?;
    for row in &rows {
        write_record(&mut writer, row.project(&columns), table.as_str())?;
    }

    finish(writer, table.as_str())?;
    tracing::debug!(table = %table, rows = rows.len(), "Table exported");

    Ok(rows.len())
}

/// Writes the list of table names, in the given order.
pub fn project_table_names<W: Write>(sink: &mut W, names: &[TableName]) -> Result<()> {
    let mut writer = csv_writer(sink);
    write_record(&mut writer, TABLE_NAMES_HEADER, "list of tables")?;
    for name in names {
        write_record(&mut writer, [name.as_str()], "list of tables")?;
    }
    finish(writer, "list of tables")
}

/// Writes the record count of every table, in the given order.
///
/// Stops at the first table that cannot be counted.
pub async fn project_table_metadata<W: Write>(
    sink: &mut W,
    storage: &dyn Storage,
    tables: &[TableName],
) -> Result<()> {
    let mut writer = csv_writer(sink);
    write_record(&mut writer, TABLE_METADATA_HEADER, "table metadata")?;
    for table in tables {
        let count = storage.read_records_count(table).await?;
        write_record(
            &mut writer,
            [table.as_str(), count.to_string().as_str()],
            "table metadata",
        )?;
    }
    finish(writer, "table metadata")
}

/// Writes rules disabled by more than one user, most disabled first.
pub async fn project_disabled_rules<W: Write>(sink: &mut W, storage: &dyn Storage) -> Result<()> {
    let records = storage.read_disabled_rules().await?;

    let mut writer = csv_writer(sink);
    write_record(&mut writer, DISABLED_RULES_HEADER, "disabled rules")?;
    for record in &records {
        write_record(
            &mut writer,
            [record.rule.as_str(), record.count.to_string().as_str()],
            "disabled rules",
        )?;
    }
    finish(writer, "disabled rules")
}
