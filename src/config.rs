//! Database configuration via `quiver.toml`
//!
//! A [`QuiverConfig`] can be built in code, parsed from a TOML string, or
//! read from a `quiver.toml` file. [`Database::open`](crate::Database::open)
//! writes a commented default file on first use and reads it back.

use quiver_concurrency::TxnOptions;
use quiver_core::{Error, Result};
use quiver_storage::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the database directory.
pub const CONFIG_FILE_NAME: &str = "quiver.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Database configuration loaded from `quiver.toml`.
///
/// # Example
///
/// ```toml
/// expand_edge = true
/// auto_register_schema = true
/// read_wait_timeout_ms = 1000
/// default_label = "testing"
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuiverConfig {
    /// Record a `_predicate_` marker for every set edge.
    #[serde(default)]
    pub expand_edge: bool,
    /// Register a schema for attributes seen for the first time.
    #[serde(default = "default_true")]
    pub auto_register_schema: bool,
    /// How long blocking reads wait for the watermark, in milliseconds.
    #[serde(default = "default_read_wait_timeout_ms")]
    pub read_wait_timeout_ms: u64,
    /// Provenance label applied to edges that carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,
    /// Default `tracing` level when `RUST_LOG` is unset, applied by
    /// `Database::init_tracing`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_read_wait_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for QuiverConfig {
    fn default() -> Self {
        Self {
            expand_edge: false,
            auto_register_schema: default_true(),
            read_wait_timeout_ms: default_read_wait_timeout_ms(),
            default_label: None,
            log_level: default_log_level(),
        }
    }
}

impl QuiverConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quiver configuration
#
# Record a `_predicate_` marker edge for every attribute set on an entity
# (default: false)
expand_edge = false

# Register a schema entry the first time an attribute is written
# (default: true)
auto_register_schema = true

# Blocking snapshot reads wait this long for the watermark (default: 1000)
read_wait_timeout_ms = 1000

# Provenance label stamped on edges that do not carry one
# default_label = "import"

# Log level used when RUST_LOG is unset: trace, debug, info, warn, error
log_level = "info"
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text does not parse or a value is
    /// out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QuiverConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.read_wait_timeout_ms == 0 {
            return Err(Error::config("read_wait_timeout_ms must be greater than 0"));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::config(format!(
                "Invalid log_level '{}'. Expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if matches!(self.default_label.as_deref(), Some("")) {
            return Err(Error::config("default_label must not be empty"));
        }
        Ok(())
    }

    /// Blocking read timeout as a `Duration`.
    pub fn read_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.read_wait_timeout_ms)
    }

    /// Options for the graph store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            auto_register_schema: self.auto_register_schema,
        }
    }

    /// Options for transactions.
    pub fn txn_options(&self) -> TxnOptions {
        TxnOptions {
            expand_edge: self.expand_edge,
            read_timeout: self.read_wait_timeout(),
            default_label: self.default_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = QuiverConfig::default();
        assert!(!config.expand_edge);
        assert!(config.auto_register_schema);
        assert_eq!(config.read_wait_timeout(), Duration::from_millis(1000));
        assert!(config.default_label.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn default_toml_parses_to_default() {
        let config = QuiverConfig::from_toml_str(QuiverConfig::default_toml()).unwrap();
        assert_eq!(config, QuiverConfig::default());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(
            QuiverConfig::from_toml_str("").unwrap(),
            QuiverConfig::default()
        );
    }

    #[test]
    fn parse_custom_values() {
        let config = QuiverConfig::from_toml_str(
            r#"
expand_edge = true
default_label = "testing"
log_level = "debug"
"#,
        )
        .unwrap();
        assert!(config.expand_edge);
        assert_eq!(config.default_label.as_deref(), Some("testing"));
        let opts = config.txn_options();
        assert!(opts.expand_edge);
        assert_eq!(opts.default_label.as_deref(), Some("testing"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for bad in [
            "read_wait_timeout_ms = 0",
            "log_level = \"loud\"",
            "default_label = \"\"",
            "expand_edge = \"yes\"",
        ] {
            let err = QuiverConfig::from_toml_str(bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{}: {:?}", bad, err);
        }
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        QuiverConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(
            QuiverConfig::from_file(&path).unwrap(),
            QuiverConfig::default()
        );
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "expand_edge = true\n").unwrap();

        QuiverConfig::write_default_if_missing(&path).unwrap();
        assert!(QuiverConfig::from_file(&path).unwrap().expand_edge);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = QuiverConfig {
            expand_edge: true,
            read_wait_timeout_ms: 250,
            default_label: Some("import".to_string()),
            ..QuiverConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(QuiverConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = QuiverConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
