use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub reference: ReferenceConfig,
    pub output: OutputConfig,
    pub warehouse: WarehouseConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dir: PathBuf,
    pub pattern: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            pattern: DEFAULT_SOURCE_PATTERN.to_string(),
        }
    }
}

/// IATA reference list. Without one the airport code pass is skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub kind: WarehouseKind,
    pub path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            kind: WarehouseKind::Sqlite,
            path: PathBuf::from(DEFAULT_WAREHOUSE_PATH),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Scores must be strictly above this to assign a code.
    pub threshold: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load from `path`, or the default config file when it exists, then
    /// apply `ETL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from `ETL_*` variables; blank values are ignored.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("ETL_SOURCE_DIR") {
            self.source.dir = PathBuf::from(v);
        }
        if let Some(v) = var("ETL_SOURCE_PATTERN") {
            self.source.pattern = v;
        }
        if let Some(v) = var("ETL_REFERENCE_PATH") {
            self.reference.path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ETL_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(v);
        }
        if let Some(v) = var("ETL_WAREHOUSE_PATH") {
            self.warehouse.path = PathBuf::from(v);
        }
        if let Some(v) = var("ETL_MATCH_THRESHOLD") {
            self.matching.threshold = v.trim().parse().map_err(|_| {
                EtlError::Config(format!("ETL_MATCH_THRESHOLD must be 0-100, got '{}'", v))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.matching.threshold > 100 {
            return Err(EtlError::Config(format!(
                "matching.threshold must be within 0-100, got {}",
                self.matching.threshold
            )));
        }
        if self.source.pattern.trim().is_empty() {
            return Err(EtlError::Config("source.pattern must not be empty".to_string()));
        }
        Ok(())
    }
}
