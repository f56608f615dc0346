//! Core data models shared by the storage backends and the projection engine.

use crate::{Result, error::ExporterError};

/// Supported database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbDriver {
    PostgreSQL,
    SQLite,
}

impl std::fmt::Display for DbDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbDriver::PostgreSQL => write!(f, "postgres"),
            DbDriver::SQLite => write!(f, "sqlite3"),
        }
    }
}

impl std::str::FromStr for DbDriver {
    type Err = ExporterError;

    fn from_str(driver: &str) -> Result<Self> {
        match driver {
            "postgres" => Ok(Self::PostgreSQL),
            "sqlite3" => Ok(Self::SQLite),
            other => Err(ExporterError::configuration(format!(
                "driver {} is not supported",
                other
            ))),
        }
    }
}

/// Name of a database relation.
///
/// Table names come from the database's own catalog listing. The only
/// validation is non-emptiness; quoting happens when the name is placed
/// into SQL text (see [`TableName::quoted`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    /// Creates a table name, rejecting empty strings.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ExporterError::configuration("table name cannot be empty"));
        }
        Ok(Self(name))
    }

    /// Returns the raw table name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as a double-quoted SQL identifier.
    ///
    /// Embedded double quotes are doubled, which is valid for both
    /// PostgreSQL and SQLite.
    pub fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Column name and driver-reported type name, captured once per table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub database_type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, database_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database_type_name: database_type_name.into(),
        }
    }
}

/// Rule disabled by more than one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledRuleRecord {
    /// Rule identifier
    pub rule: String,
    /// Number of users who disabled the rule
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_rejects_empty() {
        assert!(TableName::new("").is_err());
        assert_eq!(TableName::new("report").unwrap().as_str(), "report");
    }

    #[test]
    fn test_table_name_quoting() {
        assert_eq!(TableName::new("report").unwrap().quoted(), "\"report\"");
        assert_eq!(
            TableName::new("odd\"name").unwrap().quoted(),
            "\"odd\"\"name\""
        );
    }

    #[test]
    fn test_driver_parsing() {
        assert_eq!("postgres".parse::<DbDriver>().unwrap(), DbDriver::PostgreSQL);
        assert_eq!("sqlite3".parse::<DbDriver>().unwrap(), DbDriver::SQLite);

        let error = "non existing driver".parse::<DbDriver>().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: driver non existing driver is not supported"
        );
    }

    #[test]
    fn test_driver_display_round_trips() {
        for driver in [DbDriver::PostgreSQL, DbDriver::SQLite] {
            assert_eq!(driver.to_string().parse::<DbDriver>().unwrap(), driver);
        }
    }
}
