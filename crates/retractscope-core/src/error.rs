use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in retractscope-core.
#[derive(Debug, Error)]
pub enum RetractscopeError {
    #[error("Required input file does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Column '{column}' has an unexpected type (expected {expected})")]
    Schema {
        column: String,
        expected: &'static str,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, RetractscopeError>;
