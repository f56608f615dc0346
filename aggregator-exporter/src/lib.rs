//! Command-line front end for the aggregator exporter.
//!
//! The binary in `main.rs` only parses arguments and hands them to [`run`];
//! everything else lives here so it can be exercised from tests.

use aggregator_exporter_core::{
    ExportOptions, ExportSummary, ExportTarget, ExporterConfig, ExporterError, LogCapture,
    OutputMode, Result, S3Store, create_storage, init_logging, perform_data_export,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

pub const VERSION_MESSAGE: &str = concat!(
    "Insights Results Aggregator Exporter version ",
    env!("CARGO_PKG_VERSION")
);
pub const AUTHORS_MESSAGE: &str = "Pavel Tisnovsky, Red Hat Inc.";

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "aggregator-exporter")]
#[command(about = "Exports all tables from the aggregator database into CSV files")]
#[command(disable_version_flag = true)]
#[command(long_about = "
Insights Results Aggregator Exporter

Reads every table of the configured PostgreSQL or SQLite database and writes
each one as CSV, either into a local directory or into an S3 bucket.

Configuration is read from the file named by
INSIGHTS_RESULTS_AGGREGATOR_EXPORTER_CONFIG_FILE (default: config.toml) and
can be overridden by INSIGHTS_RESULTS_AGGREGATOR_EXPORTER__<SECTION>__<KEY>
environment variables.

EXAMPLES:
  aggregator-exporter --output csv --output-dir ./export --summary
  aggregator-exporter --output s3 --export-metadata --export-log
  aggregator-exporter --check-s3-connection
")]
pub struct Cli {
    /// Show version
    #[arg(long)]
    pub version: bool,

    /// Show authors
    #[arg(long)]
    pub authors: bool,

    /// Show configuration (passwords are omitted)
    #[arg(long)]
    pub show_configuration: bool,

    /// Check that the configured S3 bucket is reachable
    #[arg(long)]
    pub check_s3_connection: bool,

    /// Output to: csv (local directory) or s3
    #[arg(long, value_name = "TYPE")]
    pub output: Option<String>,

    /// Directory for CSV output
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum number of rows exported per table (0 = all)
    #[arg(long, value_name = "N")]
    pub limit: Option<u32>,

    /// Print summary table after export
    #[arg(long)]
    pub summary: bool,

    /// Export record counts of all tables into _metadata.csv
    #[arg(long)]
    pub export_metadata: bool,

    /// Export disabled rules into _disabled_rules.csv
    #[arg(long)]
    pub export_disabled_rules: bool,

    /// Export the log of this run into _logs.txt
    #[arg(long)]
    pub export_log: bool,
}

impl Cli {
    fn export_options(&self, config: &ExporterConfig) -> ExportOptions {
        ExportOptions {
            limit: self.limit,
            table_prefix: config.s3.prefix.clone(),
            export_metadata: self.export_metadata,
            export_disabled_rules: self.export_disabled_rules,
            export_log: self.export_log,
        }
    }
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    /// Database query, metadata, scan or connection failure
    StorageError,
    /// Sink write or upload failure
    OutputError,
    /// Bad configuration or command line
    ConfigurationError,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::StorageError => 1,
            ExitStatus::OutputError => 2,
            ExitStatus::ConfigurationError => 3,
        }
    }

    /// Classifies an error into the status the process exits with.
    pub fn for_error(error: &ExporterError) -> Self {
        if error.is_storage_error() {
            ExitStatus::StorageError
        } else if error.is_output_error() {
            ExitStatus::OutputError
        } else {
            ExitStatus::ConfigurationError
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Loads configuration, initializes logging and performs the selected
/// operation.
pub async fn run(cli: &Cli) -> ExitStatus {
    let config_file = ExporterConfig::config_file();
    let config = match ExporterConfig::load_from(config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Load configuration: {}", e);
            return ExitStatus::for_error(&e);
        }
    };

    let capture = cli.export_log.then(LogCapture::new);
    if let Err(e) = init_logging(&config.logging, capture.clone()) {
        eprintln!("{}", e);
        return ExitStatus::for_error(&e);
    }

    match &config_file {
        Some(path) => info!(filename = %path.display(), "Configuration file parsed"),
        None => info!("No configuration file found, using defaults"),
    }

    run_with_config(cli, &config, capture.as_ref()).await
}

/// Performs the selected operation with an already loaded configuration.
///
/// Logging is expected to be initialized by the caller.
pub async fn run_with_config(
    cli: &Cli,
    config: &ExporterConfig,
    capture: Option<&LogCapture>,
) -> ExitStatus {
    match do_selected_operation(cli, config, capture).await {
        Ok(()) => ExitStatus::Ok,
        Err(e) => {
            error!(error = %e, "Do selected operation");
            ExitStatus::for_error(&e)
        }
    }
}

async fn do_selected_operation(
    cli: &Cli,
    config: &ExporterConfig,
    capture: Option<&LogCapture>,
) -> Result<()> {
    if cli.version {
        println!("{}", VERSION_MESSAGE);
        return Ok(());
    }
    if cli.authors {
        println!("{}", AUTHORS_MESSAGE);
        return Ok(());
    }
    if cli.show_configuration {
        show_configuration(config);
        return Ok(());
    }
    if cli.check_s3_connection {
        return check_s3_connection(config).await;
    }

    let summary = export(cli, config, capture).await?;
    if cli.summary {
        print!("{}", summary);
    }
    Ok(())
}

/// Logs the configuration with the database password and S3 secret omitted.
pub fn show_configuration(config: &ExporterConfig) {
    let storage = &config.storage;
    info!(
        driver = %storage.db_driver,
        datasource = %storage.sqlite_datasource,
        db_name = %storage.pg_db_name,
        username = %storage.pg_username,
        host = %storage.pg_host,
        port = storage.pg_port,
        log_sql_queries = storage.log_sql_queries,
        "Storage configuration"
    );

    let logging = &config.logging;
    info!(
        level = %logging.log_level,
        debug = logging.debug,
        "Logging configuration"
    );

    let s3 = &config.s3;
    info!(
        storage_type = %s3.r#type,
        url = %s3.endpoint_url,
        port = s3.endpoint_port,
        access_key_id = %s3.access_key_id,
        use_ssl = s3.use_ssl,
        bucket = %s3.bucket,
        region = %s3.region,
        prefix = %s3.prefix,
        "S3 configuration"
    );
}

async fn check_s3_connection(config: &ExporterConfig) -> Result<()> {
    let store = S3Store::connect(&config.s3)?;
    if !store.bucket_exists().await? {
        return Err(ExporterError::configuration(format!(
            "bucket '{}' does not exist at {}",
            store.bucket(),
            store.endpoint()
        )));
    }

    info!(bucket = store.bucket(), endpoint = store.endpoint(), "S3 connection is OK");
    println!("Bucket {} is accessible", store.bucket());
    Ok(())
}

/// Resolves the output target selected by `--output`.
///
/// # Errors
/// Returns a configuration error when no output is selected, the mode is
/// unknown, or the target cannot be set up from the configuration.
pub fn export_target(cli: &Cli, config: &ExporterConfig) -> Result<ExportTarget> {
    let mode: OutputMode = cli
        .output
        .as_deref()
        .ok_or_else(|| {
            ExporterError::configuration("no output selected, use --output csv or --output s3")
        })?
        .parse()?;

    match mode {
        OutputMode::Directory => ExportTarget::directory(&cli.output_dir),
        OutputMode::ObjectStore => Ok(ExportTarget::ObjectStore(S3Store::connect(&config.s3)?)),
    }
}

async fn export(
    cli: &Cli,
    config: &ExporterConfig,
    capture: Option<&LogCapture>,
) -> Result<ExportSummary> {
    let target = export_target(cli, config)?;
    info!(output = %target.mode(), "Starting data export");

    let storage = create_storage(&config.storage)?;
    perform_data_export(
        storage.as_ref(),
        &target,
        &cli.export_options(config),
        capture,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Ok.code(), 0);
        assert_eq!(ExitStatus::StorageError.code(), 1);
        assert_eq!(ExitStatus::OutputError.code(), 2);
        assert_eq!(ExitStatus::ConfigurationError.code(), 3);
    }

    #[test]
    fn test_exit_status_for_error() {
        let error = ExporterError::metadata_unavailable("no columns reported for 'empty'");
        assert_eq!(ExitStatus::for_error(&error), ExitStatus::StorageError);

        let error = ExporterError::write_failed("upload", std::io::Error::other("denied"));
        assert_eq!(ExitStatus::for_error(&error), ExitStatus::OutputError);

        let error = ExporterError::configuration("driver mysql is not supported");
        assert_eq!(ExitStatus::for_error(&error), ExitStatus::ConfigurationError);
    }

    #[test]
    fn test_export_options_take_prefix_from_s3_section() {
        let cli = Cli::parse_from([
            "aggregator-exporter",
            "--output",
            "csv",
            "--limit",
            "10",
            "--export-metadata",
        ]);
        let mut config = ExporterConfig::default();
        config.s3.prefix = "2021-01-01/".to_string();

        let options = cli.export_options(&config);
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.table_prefix, "2021-01-01/");
        assert!(options.export_metadata);
        assert!(!options.export_disabled_rules);
        assert!(!options.export_log);
    }

    #[test]
    fn test_missing_output_is_configuration_error() {
        let cli = Cli::parse_from(["aggregator-exporter"]);
        let error = export_target(&cli, &ExporterConfig::default()).unwrap_err();
        assert!(matches!(error, ExporterError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_output_is_configuration_error() {
        let cli = Cli::parse_from(["aggregator-exporter", "--output", "ftp"]);
        let error = export_target(&cli, &ExporterConfig::default()).unwrap_err();
        assert!(error.to_string().contains("ftp"));
    }

    #[test]
    fn test_s3_output_requires_bucket() {
        let cli = Cli::parse_from(["aggregator-exporter", "--output", "s3"]);
        let error = export_target(&cli, &ExporterConfig::default()).unwrap_err();
        assert!(error.to_string().contains("bucket"));
    }
}
