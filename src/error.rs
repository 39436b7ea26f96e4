//! Error types for the `pgjsonl` binary.
//!
//! Wraps engine errors from `pgjsonl-lib` together with the failures only
//! the binary can hit: connecting to PostgreSQL, reading a YAML profile,
//! and prompting for a password.

use std::path::PathBuf;
use thiserror::Error;

use pgjsonl_lib::PgJsonlError;

/// Primary error type for the `pgjsonl` binary.
#[derive(Error, Debug)]
pub enum AppError {
    // === Engine Errors ===
    /// Error raised by the import/export engine.
    #[error(transparent)]
    Engine(#[from] PgJsonlError),

    // === Database Errors ===
    /// Could not open a session to the server.
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: postgres::Error,
    },

    /// Error from an established connection.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    // === Configuration Errors ===
    /// Profile file could not be parsed.
    #[error("Invalid profile {path}: {source}")]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid option value.
    #[error("Configuration error: {0}")]
    Config(String),

    // === Terminal Errors ===
    /// Password prompt was interrupted.
    #[error("Password prompt cancelled")]
    PromptCancelled,

    // === I/O Errors ===
    /// File system or terminal I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

/// Result type using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
