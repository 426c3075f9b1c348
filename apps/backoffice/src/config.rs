//! # Back-Office Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GUDANG_DB_PATH=/srv/gudang/gudang.db                               │
//! │     GUDANG_ALLOW_NEGATIVE_STOCK=false                                  │
//! │     GUDANG_MAX_WRITE_ATTEMPTS=50                                       │
//! │     GUDANG_LOG=debug                                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/backoffice/backoffice.toml (Linux)                       │
//! │     ~/Library/Application Support/com.gudang.backoffice/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     gudang.db in the platform data folder, negative stock allowed     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # backoffice.toml
//! [database]
//! path = "/srv/gudang/gudang.db"
//! max_connections = 5
//!
//! [ledger]
//! allow_negative_stock = false
//! max_write_attempts = 25
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use gudang_core::LedgerSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const CONFIG_FILE: &str = "backoffice.toml";
const DATABASE_FILE: &str = "gudang.db";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Database file. Defaults to `gudang.db` in the platform data folder.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else the platform config folder)
    /// 3. Environment variables
    ///
    /// An explicit `config_path` must exist; the default one may be absent.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Applies `GUDANG_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(path) = lookup("GUDANG_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("GUDANG_ALLOW_NEGATIVE_STOCK") {
            self.ledger.allow_negative_stock = parse_bool(&value)
                .ok_or_else(|| ConfigError::InvalidValue("GUDANG_ALLOW_NEGATIVE_STOCK".to_string()))?;
        }

        if let Some(value) = lookup("GUDANG_MAX_WRITE_ATTEMPTS") {
            self.ledger.max_write_attempts = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GUDANG_MAX_WRITE_ATTEMPTS".to_string()))?;
        }

        if let Some(level) = lookup("GUDANG_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }
        if self.ledger.max_write_attempts == 0 {
            return Err(ConfigError::InvalidValue("ledger.max_write_attempts".to_string()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue("logging.level".to_string()));
        }
        Ok(())
    }

    /// The configured database file, or `gudang.db` in the platform data
    /// folder (created if missing).
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = project_dirs()
            .ok_or_else(|| ConfigError::MissingRequired("database.path".to_string()))?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|source| ConfigError::Read {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(data_dir.join(DATABASE_FILE))
    }

    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gudang", "backoffice")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.ledger.allow_negative_stock);
        assert_eq!(config.ledger.max_write_attempts, 25);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[ledger]\nallow_negative_stock = false").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert!(!config.ledger.allow_negative_stock);
        assert_eq!(config.ledger.max_write_attempts, 25);
        assert_eq!(config.database, DatabaseSection::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/from-file.db"

            [ledger]
            max_write_attempts = 10
            "#,
        )
        .unwrap();

        config
            .apply_overrides(env(&[
                ("GUDANG_DB_PATH", "/tmp/from-env.db"),
                ("GUDANG_ALLOW_NEGATIVE_STOCK", "no"),
                ("GUDANG_LOG", "debug,sqlx=warn"),
            ]))
            .unwrap();

        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/from-env.db"));
        assert!(!config.ledger.allow_negative_stock);
        assert_eq!(config.ledger.max_write_attempts, 10);
        assert_eq!(config.logging.level, "debug,sqlx=warn");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("GUDANG_MAX_WRITE_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "GUDANG_MAX_WRITE_ATTEMPTS"));

        config.ledger.max_write_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[ledger]\nmax_write_attempts = \"many\"").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }
}
