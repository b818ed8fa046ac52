//! FILENAME: core/pivot-grid/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("Pivot key '{key}' collides with source field '{field}'")]
    KeyCollision { key: String, field: String },

    #[error("Invalid pivot keys: {0}")]
    InvalidPivotKeys(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PivotError>;
