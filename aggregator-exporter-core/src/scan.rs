//! Type mapping and row materialization.
//!
//! Every column of an exported table is read through a typed, nullable
//! scan slot. The slot kind is picked once per column from the type name
//! the driver reports, and each backend decodes its native row into those
//! slots through the [`SlotDecoder`] seam.

use crate::models::ColumnDescriptor;
use crate::{ExporterError, Result};

/// Scan slot kind chosen for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Textual slot; accepts any scalar and renders it as text
    String,
    Bool,
    Int64,
    Float64,
    Int32,
}

/// Maps a driver-reported column type name to its scan kind.
///
/// Matching is exact on the upper-case name the driver reports. Anything
/// not listed falls back to the textual slot.
///
/// # Example
///
/// ```rust
/// use aggregator_exporter_core::scan::{ScanKind, scan_kind_for};
///
/// assert_eq!(scan_kind_for("INT4"), ScanKind::Int64);
/// assert_eq!(scan_kind_for("NUMERIC"), ScanKind::String);
/// ```
pub fn scan_kind_for(database_type_name: &str) -> ScanKind {
    match database_type_name {
        "VARCHAR" | "TEXT" | "UUID" | "TIMESTAMP" => ScanKind::String,
        "BOOL" => ScanKind::Bool,
        "INT4" => ScanKind::Int64,
        _ => ScanKind::String,
    }
}

/// Nullable holder for one decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanSlot {
    String(Option<String>),
    Bool(Option<bool>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Int32(Option<i32>),
}

impl ScanSlot {
    /// Returns an empty (NULL) slot of the given kind.
    pub fn null(kind: ScanKind) -> Self {
        match kind {
            ScanKind::String => Self::String(None),
            ScanKind::Bool => Self::Bool(None),
            ScanKind::Int64 => Self::Int64(None),
            ScanKind::Float64 => Self::Float64(None),
            ScanKind::Int32 => Self::Int32(None),
        }
    }

    pub fn kind(&self) -> ScanKind {
        match self {
            Self::String(_) => ScanKind::String,
            Self::Bool(_) => ScanKind::Bool,
            Self::Int64(_) => ScanKind::Int64,
            Self::Float64(_) => ScanKind::Float64,
            Self::Int32(_) => ScanKind::Int32,
        }
    }

    /// Converts the slot into a plain value.
    ///
    /// SQL NULL becomes the zero value of the slot kind, so nullable
    /// columns cannot be told apart from zero values in the output.
    pub fn into_value(self) -> Value {
        match self {
            Self::String(v) => Value::String(v.unwrap_or_default()),
            Self::Bool(v) => Value::Bool(v.unwrap_or_default()),
            Self::Int64(v) => Value::Int64(v.unwrap_or_default()),
            Self::Float64(v) => Value::Float64(v.unwrap_or_default()),
            Self::Int32(v) => Value::Int32(v.unwrap_or_default()),
        }
    }
}

/// Decoded, non-null column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    String(String),
    Int64(i64),
    Float64(f64),
    Int32(i32),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
        }
    }
}

/// One materialized table row: column names paired with values, in
/// introspection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.fields.push((column.into(), value));
    }

    /// Returns the value stored under a column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the row positionally against a column list.
    ///
    /// A column missing from the row renders as an empty field.
    pub fn project(&self, columns: &[ColumnDescriptor]) -> Vec<String> {
        columns
            .iter()
            .map(|column| {
                self.get(&column.name)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Backend row that can be decoded column by column into scan slots.
pub trait SlotDecoder {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of columns in the row.
    fn width(&self) -> usize;

    /// Decodes the column at `index` into a slot of the requested kind.
    fn decode_slot(&self, index: usize, kind: ScanKind) -> std::result::Result<ScanSlot, Self::Error>;
}

/// Row width disagrees with the introspected column list.
#[derive(Debug, thiserror::Error)]
#[error("row has {actual} columns, expected {expected}")]
pub struct RowShapeMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Decodes one backend row into a [`Row`].
///
/// Each column gets a slot from [`scan_kind_for`]; decode failures are
/// reported as scan errors naming the table and column.
pub fn materialize_row<D: SlotDecoder>(
    decoder: &D,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<Row> {
    if decoder.width() != columns.len() {
        return Err(ExporterError::Scan {
            context: format!("Unexpected row shape in table '{}'", table),
            source: Box::new(RowShapeMismatch {
                expected: columns.len(),
                actual: decoder.width(),
            }),
        });
    }

    let mut row = Row::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let kind = scan_kind_for(&column.database_type_name);
        let slot = decoder
            .decode_slot(index, kind)
            .map_err(|e| ExporterError::scan_failed(&column.name, table, e))?;
        row.push(column.name.clone(), slot.into_value());
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_kind_mapping() {
        let cases = [
            ("VARCHAR", ScanKind::String),
            ("TEXT", ScanKind::String),
            ("UUID", ScanKind::String),
            ("TIMESTAMP", ScanKind::String),
            ("BOOL", ScanKind::Bool),
            ("INT4", ScanKind::Int64),
            // fallbacks
            ("INT8", ScanKind::String),
            ("INT2", ScanKind::String),
            ("FLOAT8", ScanKind::String),
            ("TIMESTAMPTZ", ScanKind::String),
            ("JSONB", ScanKind::String),
            ("INTEGER", ScanKind::String),
            ("BOOLEAN", ScanKind::String),
            ("varchar", ScanKind::String),
            ("int4", ScanKind::String),
            ("", ScanKind::String),
            ("SOMETHING_ELSE", ScanKind::String),
        ];

        for (name, expected) in cases {
            assert_eq!(scan_kind_for(name), expected, "type name {:?}", name);
        }
    }

    #[test]
    fn test_null_slots_become_zero_values() {
        assert_eq!(
            ScanSlot::null(ScanKind::String).into_value(),
            Value::String(String::new())
        );
        assert_eq!(
            ScanSlot::null(ScanKind::Bool).into_value(),
            Value::Bool(false)
        );
        assert_eq!(ScanSlot::null(ScanKind::Int64).into_value(), Value::Int64(0));
        assert_eq!(
            ScanSlot::null(ScanKind::Float64).into_value(),
            Value::Float64(0.0)
        );
        assert_eq!(ScanSlot::null(ScanKind::Int32).into_value(), Value::Int32(0));
    }

    #[test]
    fn test_slot_kind() {
        for kind in [
            ScanKind::String,
            ScanKind::Bool,
            ScanKind::Int64,
            ScanKind::Float64,
            ScanKind::Int32,
        ] {
            assert_eq!(ScanSlot::null(kind).kind(), kind);
        }
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Int64(-42).to_string(), "-42");
        assert_eq!(Value::Int32(7).to_string(), "7");
        assert_eq!(Value::Float64(1.5).to_string(), "1.5");
        assert_eq!(Value::Float64(3.0).to_string(), "3");
        assert_eq!(Value::String("a,b".to_string()).to_string(), "a,b");
    }

    struct FakeRow(Vec<std::result::Result<ScanSlot, std::io::Error>>);

    impl SlotDecoder for FakeRow {
        type Error = std::io::Error;

        fn width(&self) -> usize {
            self.0.len()
        }

        fn decode_slot(
            &self,
            index: usize,
            _kind: ScanKind,
        ) -> std::result::Result<ScanSlot, Self::Error> {
            match &self.0[index] {
                Ok(slot) => Ok(slot.clone()),
                Err(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "INT4"),
            ColumnDescriptor::new("name", "VARCHAR"),
            ColumnDescriptor::new("active", "BOOL"),
        ]
    }

    #[test]
    fn test_materialize_row_keeps_column_order() {
        let decoder = FakeRow(vec![
            Ok(ScanSlot::Int64(Some(1))),
            Ok(ScanSlot::String(None)),
            Ok(ScanSlot::Bool(Some(true))),
        ]);

        let row = materialize_row(&decoder, "report", &columns()).unwrap();
        let names: Vec<&str> = row.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["id", "name", "active"]);
        assert_eq!(row.get("id"), Some(&Value::Int64(1)));
        assert_eq!(row.get("name"), Some(&Value::String(String::new())));
        assert_eq!(row.project(&columns()), ["1", "", "true"]);
    }

    #[test]
    fn test_materialize_row_decode_failure() {
        let decoder = FakeRow(vec![
            Ok(ScanSlot::Int64(Some(1))),
            Err(std::io::Error::other("invalid utf-8")),
            Ok(ScanSlot::Bool(Some(true))),
        ]);

        let error = materialize_row(&decoder, "report", &columns()).unwrap_err();
        assert!(matches!(error, ExporterError::Scan { .. }));
        let message = error.to_string();
        assert!(message.contains("'name'"));
        assert!(message.contains("'report'"));
    }

    #[test]
    fn test_materialize_row_width_mismatch() {
        let decoder = FakeRow(vec![Ok(ScanSlot::Int64(Some(1)))]);

        let error = materialize_row(&decoder, "report", &columns()).unwrap_err();
        match error {
            ExporterError::Scan { source, .. } => {
                assert_eq!(source.to_string(), "row has 1 columns, expected 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_project_missing_column_is_empty() {
        let mut row = Row::default();
        row.push("id", Value::Int32(5));
        let projected = row.project(&[
            ColumnDescriptor::new("id", "INT4"),
            ColumnDescriptor::new("gone", "TEXT"),
        ]);
        assert_eq!(projected, ["5", ""]);
    }
}
