//! Error types for the roster lineage engine

use thiserror::Error;

/// Result type used across the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading error (sightings, roster)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error (exports)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error (run config, merge directives)
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation referenced an identity id that the registry does not hold
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// Target id is already held by another identity
    #[error("Identity id already in use: {0}")]
    IdConflict(String),

    /// Merge of an identity with itself
    #[error("Cannot merge identity into itself: {0}")]
    SelfMerge(String),

    /// None of the configured sources produced a single usable sighting
    #[error("No usable input: {0}")]
    NoUsableInput(String),
}
