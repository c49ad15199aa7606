use chrono::NaiveDate;
use thiserror::Error;

/// Problems with an assumption set. Always raised at construction time,
/// never during generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("distribution '{name}' has no entries")]
    EmptyDistribution { name: String },

    #[error("distribution '{name}' has negative weight {weight} for {key}")]
    NegativeWeight { name: String, key: String, weight: f64 },

    #[error("distribution '{name}' sums to {sum}, expected 1.0")]
    NotNormalized { name: String, sum: f64 },

    #[error("table '{table}' is missing required key {key}")]
    MissingKey { table: String, key: String },

    #[error("range '{name}' must satisfy min <= median <= max, got ({min}, {median}, {max})")]
    InvalidRange { name: String, min: f64, median: f64, max: f64 },

    #[error("'{name}' must lie in [{lo}, {hi}], got {value}")]
    OutOfBounds { name: String, value: f64, lo: f64, hi: f64 },

    #[error("horizon end {end} precedes start {start}")]
    InvertedHorizon { start: NaiveDate, end: NaiveDate },
}

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid assumption set: {0}")]
    Config(#[from] ConfigError),

    #[error("{kind} '{id}' not found")]
    MissingEntity { kind: &'static str, id: String },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GenResult<T> = Result<T, GenError>;
