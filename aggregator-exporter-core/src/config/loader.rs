//! Loading configuration from a TOML file and the environment.
//!
//! The file named by [`CONFIG_FILE_ENV`] is read if that variable is set;
//! otherwise [`DEFAULT_CONFIG_FILE`] is read from the working directory if
//! present. Environment variables then override individual keys:
//! `INSIGHTS_RESULTS_AGGREGATOR_EXPORTER__STORAGE__PG_PORT=5433` sets
//! `storage.pg_port`. Override values are typed by the key they replace.

use super::ExporterConfig;
use crate::{ExporterError, Result};
use std::path::{Path, PathBuf};

/// Variable holding the configuration file path.
pub const CONFIG_FILE_ENV: &str = "INSIGHTS_RESULTS_AGGREGATOR_EXPORTER_CONFIG_FILE";
/// File read when [`CONFIG_FILE_ENV`] is not set.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
/// Prefix of per-key override variables.
pub const ENV_PREFIX: &str = "INSIGHTS_RESULTS_AGGREGATOR_EXPORTER__";

impl ExporterConfig {
    /// Returns the configuration file [`ExporterConfig::load`] reads, if any.
    ///
    /// Loading happens before logging is set up, so callers log the chosen
    /// file themselves.
    pub fn config_file() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_FILE_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                path.is_file().then(|| path.to_path_buf())
            }
        }
    }

    /// Loads configuration from the file and process environment.
    ///
    /// # Errors
    /// - `Io` if an explicitly named file cannot be read
    /// - `Configuration` if the file or an override is malformed
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file().as_deref())
    }

    /// Loads configuration from `file` (defaults when `None`) and applies
    /// the process environment on top.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(std::env::vars())
    }

    /// Reads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ExporterError::Io {
            context: format!("Failed to read configuration file '{}'", path.display()),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| {
            ExporterError::configuration(format!(
                "Invalid configuration file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Parses configuration from TOML text; missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ExporterError::configuration(format!("Invalid configuration: {}", e)))
    }

    /// Applies `INSIGHTS_RESULTS_AGGREGATOR_EXPORTER__SECTION__KEY` overrides.
    ///
    /// Variables without the prefix, and keys the configuration does not
    /// have, are ignored.
    ///
    /// # Errors
    /// Returns a configuration error if a value cannot be parsed as the
    /// type of the key it overrides.
    pub fn apply_env_overrides<I>(self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut document = toml::Value::try_from(&self).map_err(|e| {
            ExporterError::configuration(format!("Unable to serialize configuration: {}", e))
        })?;

        for (name, raw) in vars {
            let Some(path) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((section, key)) = path.split_once("__") else {
                continue;
            };
            let (section, key) = (section.to_lowercase(), key.to_lowercase());

            let Some(slot) = document
                .get_mut(&section)
                .and_then(|table| table.get_mut(&key))
            else {
                continue;
            };

            let replacement = typed_override(slot, &raw).ok_or_else(|| {
                ExporterError::configuration(format!(
                    "Invalid value for {}: expected {}",
                    name,
                    slot.type_str()
                ))
            })?;
            *slot = replacement;
        }

        document.try_into().map_err(|e: toml::de::Error| {
            ExporterError::configuration(format!("Invalid configuration override: {}", e))
        })
    }
}

/// Parses `raw` as the same TOML type as `current`.
fn typed_override(current: &toml::Value, raw: &str) -> Option<toml::Value> {
    match current {
        toml::Value::String(_) => Some(toml::Value::String(raw.to_string())),
        toml::Value::Integer(_) => raw.trim().parse().ok().map(toml::Value::Integer),
        toml::Value::Float(_) => raw.trim().parse().ok().map(toml::Value::Float),
        toml::Value::Boolean(_) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(toml::Value::Boolean(true)),
            "false" | "0" | "no" | "off" => Some(toml::Value::Boolean(false)),
            _ => None,
        },
        _ => None,
    }
}
