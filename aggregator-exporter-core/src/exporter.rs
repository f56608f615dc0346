//! Full export run: every table plus the auxiliary artifacts.
//!
//! Tables are exported one at a time in catalog order. The first failure
//! aborts the run; artifacts committed before it stay in place.

use crate::export::{
    project_disabled_rules, project_table, project_table_metadata, project_table_names,
};
use crate::logging::LogCapture;
use crate::models::TableName;
use crate::output::{
    CSV_CONTENT_TYPE, DISABLED_RULES_ARTIFACT, ExportTarget, LOG_ARTIFACT, METADATA_ARTIFACT,
    TABLES_ARTIFACT, TEXT_CONTENT_TYPE, table_artifact_name,
};
use crate::storage::Storage;
use crate::{ExporterError, Result};

/// What to export besides the tables themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Row cap per table; `None` or `Some(0)` exports everything
    pub limit: Option<u32>,
    /// Prepended to each table artifact name
    pub table_prefix: String,
    pub export_metadata: bool,
    pub export_disabled_rules: bool,
    /// Export the run's own log as the last artifact
    pub export_log: bool,
}

/// One exported table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExport {
    pub table: TableName,
    pub artifact: String,
    pub rows: usize,
}

/// Result of a successful export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub tables: Vec<TableExport>,
    /// Auxiliary artifacts in the order they were written
    pub artifacts: Vec<String>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .tables
            .iter()
            .map(|t| t.table.as_str().len())
            .chain(std::iter::once("Table".len()))
            .max()
            .unwrap_or_default();

        writeln!(f, "{:<width$}  {:>10}  Artifact", "Table", "Rows")?;
        for export in &self.tables {
            writeln!(
                f,
                "{:<width$}  {:>10}  {}",
                export.table, export.rows, export.artifact
            )?;
        }
        writeln!(
            f,
            "{} tables, {} rows exported",
            self.tables.len(),
            self.total_rows()
        )
    }
}

/// Exports every table and the selected auxiliary artifacts.
///
/// Order: `_tables.csv`, one CSV per table, `_metadata.csv`,
/// `_disabled_rules.csv`, then `_logs.txt` after the storage is closed.
///
/// # Errors
/// Returns the first storage or write error encountered. Requesting the
/// log artifact without a `log_capture` is a configuration error.
pub async fn perform_data_export(
    storage: &dyn Storage,
    target: &ExportTarget,
    options: &ExportOptions,
    log_capture: Option<&LogCapture>,
) -> Result<ExportSummary> {
    if options.export_log && log_capture.is_none() {
        return Err(ExporterError::configuration(
            "log export requested but log capture is not enabled",
        ));
    }

    let mut summary = ExportSummary::default();

    let tables = storage.read_list_of_tables().await?;
    tracing::info!(count = tables.len(), "List of tables");
    for (index, table) in (1_usize..).zip(&tables) {
        tracing::info!(index, table = %table, "Table in database");
    }

    let mut sink = target.open(TABLES_ARTIFACT, CSV_CONTENT_TYPE)?;
    project_table_names(&mut sink, &tables)?;
    target.commit(sink).await?;
    summary.artifacts.push(TABLES_ARTIFACT.to_string());

    for table in &tables {
        let artifact = table_artifact_name(&options.table_prefix, table);
        let mut sink = target.open(&artifact, CSV_CONTENT_TYPE)?;
        let rows = project_table(&mut sink, storage, table, options.limit).await?;
        target.commit(sink).await?;

        tracing::info!(table = %table, rows, artifact = %artifact, "Table exported");
        summary.tables.push(TableExport {
            table: table.clone(),
            artifact,
            rows,
        });
    }

    if options.export_metadata {
        let mut sink = target.open(METADATA_ARTIFACT, CSV_CONTENT_TYPE)?;
        project_table_metadata(&mut sink, storage, &tables).await?;
        target.commit(sink).await?;
        summary.artifacts.push(METADATA_ARTIFACT.to_string());
    }

    if options.export_disabled_rules {
        let mut sink = target.open(DISABLED_RULES_ARTIFACT, CSV_CONTENT_TYPE)?;
        project_disabled_rules(&mut sink, storage).await?;
        target.commit(sink).await?;
        summary.artifacts.push(DISABLED_RULES_ARTIFACT.to_string());
    }

    storage.close().await;
    tracing::info!(
        tables = summary.tables.len(),
        rows = summary.total_rows(),
        "Export finished"
    );

    if let Some(capture) = log_capture.filter(|_| options.export_log) {
        target
            .store(LOG_ARTIFACT, TEXT_CONTENT_TYPE, &capture.contents())
            .await?;
        summary.artifacts.push(LOG_ARTIFACT.to_string());
    }

    Ok(summary)
}
