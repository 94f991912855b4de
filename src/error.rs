use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column '{column}' in {file}")]
    MissingColumn { file: PathBuf, column: String },

    #[error("Malformed value '{value}' in column '{column}' (line {line})")]
    MalformedValue {
        column: String,
        value: String,
        line: u64,
    },

    #[error("Blank natural key component '{column}' for {dimension}")]
    NullKeyComponent {
        dimension: &'static str,
        column: &'static str,
    },

    #[error("No {dimension} surrogate id for key {key}")]
    UnresolvedKey { dimension: &'static str, key: String },

    #[error("Warehouse error: {0}")]
    Warehouse(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
