//! Import configuration file support
//!
//! Handles parsing of `.geo-import.toml` configuration files and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::import::{
    DEFAULT_GEOMETRY_COLUMNS, DEFAULT_LATITUDE_COLUMNS, DEFAULT_LONGITUDE_COLUMNS, ReaderOptions,
};
use crate::staging::{InMemoryStagingStore, StagingStore};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".geo-import.toml";

/// Default database filename for the DuckDB staging backend
pub const DEFAULT_DUCKDB_FILENAME: &str = ".geo-import.duckdb";

/// Default upload size limit (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Environment variable for the upload size limit
pub const ENV_MAX_FILE_SIZE: &str = "GEO_IMPORT_MAX_FILE_SIZE";

/// Environment variable for the staging backend
pub const ENV_STAGING_BACKEND: &str = "GEO_IMPORT_STAGING_BACKEND";

/// Environment variable for the DuckDB path
pub const ENV_DUCKDB_PATH: &str = "GEO_IMPORT_DUCKDB_PATH";

/// Environment variable for the per-run conversion limit
pub const ENV_MAX_FEATURES_PER_RUN: &str = "GEO_IMPORT_MAX_FEATURES_PER_RUN";

/// Error type for configuration handling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialization(String),

    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Staging backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Staging backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingBackendType {
    /// In-process memory (default)
    #[default]
    Memory,
    /// DuckDB embedded database
    DuckDB,
}

impl std::str::FromStr for StagingBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StagingBackendType::Memory),
            "duckdb" => Ok(StagingBackendType::DuckDB),
            _ => Err(format!(
                "Unknown staging backend: {}. Use 'memory' or 'duckdb'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for StagingBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StagingBackendType::Memory => write!(f, "memory"),
            StagingBackendType::DuckDB => write!(f, "duckdb"),
        }
    }
}

/// Upload configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSection {
    /// Largest accepted file, in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

/// CSV reader configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSection {
    /// Field delimiter, a single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Column names holding WKT geometry
    #[serde(default = "default_geometry_columns")]
    pub geometry_columns: Vec<String>,

    #[serde(default = "default_latitude_columns")]
    pub latitude_columns: Vec<String>,

    #[serde(default = "default_longitude_columns")]
    pub longitude_columns: Vec<String>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn default_geometry_columns() -> Vec<String> {
    owned(DEFAULT_GEOMETRY_COLUMNS)
}

fn default_latitude_columns() -> Vec<String> {
    owned(DEFAULT_LATITUDE_COLUMNS)
}

fn default_longitude_columns() -> Vec<String> {
    owned(DEFAULT_LONGITUDE_COLUMNS)
}

impl Default for CsvSection {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            geometry_columns: default_geometry_columns(),
            latitude_columns: default_latitude_columns(),
            longitude_columns: default_longitude_columns(),
        }
    }
}

/// Conversion configuration section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionSection {
    /// Most features attempted per conversion run; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_features_per_run: Option<usize>,
}

/// Staging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingSection {
    #[serde(default)]
    pub backend: StagingBackendType,

    /// Path to the DuckDB file (relative to the working directory, or absolute)
    #[serde(default = "default_duckdb_path")]
    pub path: String,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

impl Default for StagingSection {
    fn default() -> Self {
        Self {
            backend: StagingBackendType::default(),
            path: default_duckdb_path(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.geo-import.toml` configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub upload: UploadSection,

    #[serde(default)]
    pub csv: CsvSection,

    #[serde(default)]
    pub conversion: ConversionSection,

    #[serde(default)]
    pub staging: StagingSection,
}

impl ImportConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.geo-import.toml` in `dir` and falls back to defaults if not
    /// found. Environment overrides are applied either way.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(format!("Failed to read config: {}", e)))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let config_path = dir.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var(ENV_MAX_FILE_SIZE)
            && let Ok(size) = size.parse()
        {
            self.upload.max_file_size = size;
        }

        if let Ok(backend) = std::env::var(ENV_STAGING_BACKEND)
            && let Ok(backend) = backend.parse()
        {
            self.staging.backend = backend;
        }

        if let Ok(path) = std::env::var(ENV_DUCKDB_PATH) {
            self.staging.path = path;
        }

        if let Ok(max) = std::env::var(ENV_MAX_FEATURES_PER_RUN)
            && let Ok(max) = max.parse::<usize>()
        {
            self.conversion.max_features_per_run = Some(max).filter(|m| *m > 0);
        }
    }

    /// Reader options built from the `[csv]` section
    pub fn reader_options(&self) -> Result<ReaderOptions, ConfigError> {
        let delimiter = match self.csv.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "csv.delimiter".to_string(),
                    reason: format!(
                        "expected a single ASCII character, got '{}'",
                        self.csv.delimiter
                    ),
                });
            }
        };

        Ok(ReaderOptions {
            delimiter,
            geometry_columns: self.csv.geometry_columns.clone(),
            latitude_columns: self.csv.latitude_columns.clone(),
            longitude_columns: self.csv.longitude_columns.clone(),
        })
    }

    /// Get the DuckDB database path relative to `dir`
    pub fn duckdb_path(&self, dir: &Path) -> PathBuf {
        if self.staging.path.is_empty() {
            dir.join(DEFAULT_DUCKDB_FILENAME)
        } else if Path::new(&self.staging.path).is_absolute() {
            PathBuf::from(&self.staging.path)
        } else {
            dir.join(&self.staging.path)
        }
    }

    /// Open the configured staging store
    pub fn open_staging_store(&self, dir: &Path) -> Result<Arc<dyn StagingStore>, ConfigError> {
        match self.staging.backend {
            StagingBackendType::Memory => Ok(Arc::new(InMemoryStagingStore::new())),
            #[cfg(feature = "duckdb-backend")]
            StagingBackendType::DuckDB => {
                let store = crate::staging::DuckDBStagingStore::new(self.duckdb_path(dir))
                    .map_err(|e| ConfigError::BackendUnavailable(e.to_string()))?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            StagingBackendType::DuckDB => {
                let _ = dir;
                Err(ConfigError::BackendUnavailable(
                    "built without the duckdb-backend feature".to_string(),
                ))
            }
        }
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Geo Import SDK Configuration

[upload]
# Largest accepted upload, in bytes
max_file_size = 52428800

[csv]
delimiter = ","
geometry_columns = ["geom", "geometry", "wkt"]
latitude_columns = ["lat", "latitude"]
longitude_columns = ["lon", "lng", "long", "longitude"]

[conversion]
# Most features attempted per conversion run (unlimited when unset)
# max_features_per_run = 1000

[staging]
# Staging backend: "memory" (default) or "duckdb"
backend = "memory"

# Path to the DuckDB file (relative, or absolute)
path = ".geo-import.duckdb"
"#
}
