//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Database used when a command does not name one
    #[serde(default = "default_db")]
    pub default_db: String,

    /// Run every stage chain through the materialized pipeline
    #[serde(default)]
    pub force_materialized: bool,
}

fn default_db() -> String {
    "default".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_db: default_db(),
            force_materialized: false,
        }
    }
}

/// Archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_archive_file")]
    pub file_name: String,
}

fn default_archive_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("chronicle").join("archive"))
        .unwrap_or_else(|| PathBuf::from("./chronicle_archive"))
}

fn default_archive_file() -> String {
    "buckets.archive".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            file_name: default_archive_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Nothing is logged here since this runs before the subscriber is
    /// installed; the returned origin says what happened.
    pub fn load_default() -> (Self, ConfigOrigin) {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("chronicle").join("query.toml")),
            Some(PathBuf::from("/etc/chronicle/query.toml")),
            Some(PathBuf::from("./query.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first candidate file that exists and parses
    pub fn load_first(candidates: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    origin.path = Some(path.clone());
                    return (config, origin);
                }
                Err(e) => origin.skipped.push(e),
            }
        }

        (Self::from_env(), origin)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Query overrides
        if let Ok(db) = std::env::var("CHRONICLE_QUERY_DB") {
            self.query.default_db = db;
        }
        if let Ok(force) = std::env::var("CHRONICLE_QUERY_FORCE_MATERIALIZED") {
            if let Ok(f) = force.parse() {
                self.query.force_materialized = f;
            }
        }

        // Archive overrides
        if let Ok(dir) = std::env::var("CHRONICLE_ARCHIVE_DIR") {
            self.archive.dir = PathBuf::from(dir);
        }

        // Logging overrides
        if let Ok(level) = std::env::var("CHRONICLE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CHRONICLE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Where a default-located configuration came from
#[derive(Debug, Default)]
pub struct ConfigOrigin {
    /// File the configuration was read from, `None` for defaults
    pub path: Option<PathBuf>,
    /// Candidate files that exist but failed to load
    pub skipped: Vec<ConfigError>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chronicle Query Configuration
#
# Environment variables override these settings:
# - CHRONICLE_QUERY_DB
# - CHRONICLE_QUERY_FORCE_MATERIALIZED
# - CHRONICLE_ARCHIVE_DIR
# - CHRONICLE_LOG_LEVEL
# - CHRONICLE_LOG_FORMAT

[query]
# Database queried when none is given on the command line
default_db = "default"

# Run all stage chains through the materialized pipeline
force_materialized = false

[archive]
# Directory holding archived buckets
dir = "./chronicle_archive"

# Archive file name inside the directory
file_name = "buckets.archive"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/chronicle/query.log"
"#
    .to_string()
}
