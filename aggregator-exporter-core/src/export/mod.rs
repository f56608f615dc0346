//! Serialization of tables and aggregates into export artifacts.

pub mod projection;

pub use projection::{
    project_disabled_rules, project_table, project_table_metadata, project_table_names,
};
