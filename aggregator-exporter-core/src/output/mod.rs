//! Export destinations: a local directory or an S3 bucket.
//!
//! Writers never talk to a destination directly. They write into an
//! [`ExportSink`] opened by an [`ExportTarget`], and the target commits the
//! sink when the artifact is complete: file sinks are flushed, buffered
//! sinks are uploaded.

pub mod s3;

pub use s3::S3Store;

use crate::models::TableName;
use crate::{ExporterError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// List of exported tables.
pub const TABLES_ARTIFACT: &str = "_tables.csv";
/// Record count per table.
pub const METADATA_ARTIFACT: &str = "_metadata.csv";
/// Rules disabled by more than one user.
pub const DISABLED_RULES_ARTIFACT: &str = "_disabled_rules.csv";
/// Log of the export run.
pub const LOG_ARTIFACT: &str = "_logs.txt";

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Artifact name for one table's data.
pub fn table_artifact_name(prefix: &str, table: &TableName) -> String {
    format!("{}{}.csv", prefix, table)
}

/// Where the export goes, as selected by `--output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Directory,
    ObjectStore,
}

impl std::str::FromStr for OutputMode {
    type Err = ExporterError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "csv" | "file" => Ok(Self::Directory),
            "s3" => Ok(Self::ObjectStore),
            _ => Err(ExporterError::configuration(format!(
                "unknown output type '{}', expected 'csv' or 's3'",
                mode
            ))),
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Directory => write!(f, "csv"),
            OutputMode::ObjectStore => write!(f, "s3"),
        }
    }
}

/// Byte destination for a single artifact.
#[derive(Debug)]
pub enum ExportSink {
    /// Buffered local file
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
    /// In-memory bytes uploaded on commit
    Buffer {
        key: String,
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

impl Write for ExportSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            ExportSink::File { writer, .. } => writer.write(buf),
            ExportSink::Buffer { bytes, .. } => bytes.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ExportSink::File { writer, .. } => writer.flush(),
            ExportSink::Buffer { .. } => Ok(()),
        }
    }
}

/// Destination that opens and commits sinks.
#[derive(Debug)]
pub enum ExportTarget {
    Directory { dir: PathBuf },
    ObjectStore(S3Store),
}

impl ExportTarget {
    /// Targets a local directory, which must already exist.
    pub fn directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ExporterError::configuration(format!(
                "output directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self::Directory {
            dir: dir.to_path_buf(),
        })
    }

    pub fn mode(&self) -> OutputMode {
        match self {
            ExportTarget::Directory { .. } => OutputMode::Directory,
            ExportTarget::ObjectStore(_) => OutputMode::ObjectStore,
        }
    }

    /// Opens a sink for the named artifact.
    ///
    /// # Errors
    /// Returns a write error if the local file cannot be created.
    pub fn open(&self, name: &str, content_type: &'static str) -> Result<ExportSink> {
        match self {
            ExportTarget::Directory { dir } => {
                let path = dir.join(name);
                // prefixes may contain '/'
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ExporterError::write_failed(
                            format!("Failed to create directory '{}'", parent.display()),
                            e,
                        )
                    })?;
                }
                let file = File::create(&path).map_err(|e| {
                    ExporterError::write_failed(
                        format!("Failed to create file '{}'", path.display()),
                        e,
                    )
                })?;
                Ok(ExportSink::File {
                    path,
                    writer: BufWriter::new(file),
                })
            }
            ExportTarget::ObjectStore(_) => Ok(ExportSink::Buffer {
                key: name.to_string(),
                content_type,
                bytes: Vec::new(),
            }),
        }
    }

    /// Completes an artifact: flushes a file or uploads a buffer.
    ///
    /// # Errors
    /// Returns a write error if flushing or uploading fails, and a
    /// configuration error for a sink this target did not open.
    pub async fn commit(&self, sink: ExportSink) -> Result<()> {
        match (self, sink) {
            (_, ExportSink::File { path, mut writer }) => {
                writer.flush().map_err(|e| {
                    ExporterError::write_failed(
                        format!("Failed to write file '{}'", path.display()),
                        e,
                    )
                })?;
                tracing::info!(file = %path.display(), "Artifact written");
            }
            (
                ExportTarget::ObjectStore(store),
                ExportSink::Buffer {
                    key,
                    content_type,
                    bytes,
                },
            ) => {
                store.put_object(&key, content_type, bytes).await?;
                tracing::info!(object = %key, bucket = %store.bucket(), "Artifact uploaded");
            }
            (ExportTarget::Directory { .. }, ExportSink::Buffer { key, .. }) => {
                return Err(ExporterError::configuration(format!(
                    "buffered artifact '{}' cannot be committed to a directory",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Writes a complete artifact in one step.
    pub async fn store(&self, name: &str, content_type: &'static str, bytes: &[u8]) -> Result<()> {
        let mut sink = self.open(name, content_type)?;
        sink.write_all(bytes).map_err(|e| {
            ExporterError::write_failed(format!("Failed to write '{}'", name), e)
        })?;
        self.commit(sink).await
    }
}
