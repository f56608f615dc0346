//! Decoding of SQLite row values into scan slots.
//!
//! SQLite is dynamically typed: the storage class of each value (`INTEGER`,
//! `REAL`, `TEXT`, `BLOB`) decides how it is read, not the declared column
//! type.

use crate::scan::{ScanKind, ScanSlot, SlotDecoder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

impl SlotDecoder for SqliteRow {
    type Error = sqlx::Error;

    fn width(&self) -> usize {
        self.len()
    }

    fn decode_slot(&self, index: usize, kind: ScanKind) -> Result<ScanSlot, Self::Error> {
        let storage_class = {
            let raw = self.try_get_raw(index)?;
            if raw.is_null() {
                return Ok(ScanSlot::null(kind));
            }
            raw.type_info().name().to_string()
        };

        let slot = match kind {
            ScanKind::String => ScanSlot::String(Some(match storage_class.as_str() {
                "INTEGER" => self.try_get::<i64, _>(index)?.to_string(),
                "REAL" => self.try_get::<f64, _>(index)?.to_string(),
                "BLOB" => String::from_utf8_lossy(&self.try_get::<Vec<u8>, _>(index)?).into_owned(),
                _ => self.try_get::<String, _>(index)?,
            })),
            ScanKind::Bool => ScanSlot::Bool(Some(self.try_get(index)?)),
            ScanKind::Int64 => ScanSlot::Int64(Some(self.try_get(index)?)),
            ScanKind::Float64 => ScanSlot::Float64(Some(match storage_class.as_str() {
                // integral values stored in a REAL column come back as INTEGER
                #[allow(clippy::cast_precision_loss)]
                "INTEGER" => self.try_get::<i64, _>(index)? as f64,
                _ => self.try_get(index)?,
            })),
            ScanKind::Int32 => ScanSlot::Int32(Some(self.try_get(index)?)),
        };

        Ok(slot)
    }
}
