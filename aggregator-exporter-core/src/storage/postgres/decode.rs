//! Decoding of PostgreSQL row values into scan slots.
//!
//! Decoding is driven by the type name PostgreSQL reports for each value.
//! Narrower integer and float types are widened into the requested slot,
//! and the textual slot renders the types listed in [`TEXT_DECODED_TYPES`].
//! Everything else (`NUMERIC`, `JSON`, arrays, enums, ...) is cast to `text`
//! in the select list (see [`needs_text_cast`]) and arrives as `TEXT`.

use crate::scan::{ScanKind, ScanSlot, SlotDecoder, scan_kind_for};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Row, TypeInfo, ValueRef};

impl SlotDecoder for PgRow {
    type Error = sqlx::Error;

    fn width(&self) -> usize {
        self.len()
    }

    fn decode_slot(&self, index: usize, kind: ScanKind) -> Result<ScanSlot, Self::Error> {
        let type_name = {
            let raw = self.try_get_raw(index)?;
            raw.type_info().name().to_string()
        };

        let slot = match kind {
            ScanKind::String => ScanSlot::String(decode_text(self, index, &type_name)?),
            ScanKind::Bool => ScanSlot::Bool(self.try_get(index)?),
            ScanKind::Int64 => ScanSlot::Int64(match type_name.as_str() {
                "INT2" => self.try_get::<Option<i16>, _>(index)?.map(i64::from),
                "INT4" => self.try_get::<Option<i32>, _>(index)?.map(i64::from),
                _ => self.try_get(index)?,
            }),
            ScanKind::Float64 => ScanSlot::Float64(match type_name.as_str() {
                "FLOAT4" => self.try_get::<Option<f32>, _>(index)?.map(f64::from),
                _ => self.try_get(index)?,
            }),
            ScanKind::Int32 => ScanSlot::Int32(match type_name.as_str() {
                "INT2" => self.try_get::<Option<i16>, _>(index)?.map(i32::from),
                _ => self.try_get(index)?,
            }),
        };

        Ok(slot)
    }
}

/// Types [`decode_text`] reads natively.
pub(crate) const TEXT_DECODED_TYPES: &[&str] = &[
    "BOOL",
    "INT2",
    "INT4",
    "INT8",
    "FLOAT4",
    "FLOAT8",
    "UUID",
    "TIMESTAMP",
    "TIMESTAMPTZ",
    "DATE",
    "TIME",
    "BYTEA",
    "TEXT",
    "VARCHAR",
    "CHAR",
    "NAME",
];

/// Returns true if a column of this type must be cast to `text` before it
/// can be scanned.
pub(crate) fn needs_text_cast(database_type_name: &str) -> bool {
    scan_kind_for(database_type_name) == ScanKind::String
        && !TEXT_DECODED_TYPES.contains(&database_type_name)
}

/// Reads a value of any supported type as text.
fn decode_text(row: &PgRow, index: usize, type_name: &str) -> Result<Option<String>, sqlx::Error> {
    let text = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(|v| v.to_string()),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(|v| v.to_string()),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(|v| v.to_string()),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(|v| v.to_string()),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(|v| v.to_string()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(|v| v.to_string()),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)?
            .map(|v| v.hyphenated().to_string()),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|v| format_timestamp(&v.and_utc())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|v| format_timestamp(&v)),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| v.to_string()),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|v| v.to_string()),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(|v| String::from_utf8_lossy(&v).into_owned()),
        _ => row.try_get::<Option<String>, _>(index)?,
    };

    Ok(text)
}

/// RFC 3339 with `Z` for UTC and no trailing zeros in the fraction.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    let formatted = timestamp
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.9f")
        .to_string();
    format!("{}Z", formatted.trim_end_matches('0').trim_end_matches('.'))
}
