//! Error types for `pgjsonl-lib`.
//!
//! The four engine failure classes (decode, schema, constraint, load) are
//! kept as distinct variants so the orchestrator can decide which ones
//! abort the run and which ones are isolated to a single table.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for pgjsonl-lib operations.
#[derive(Error, Debug)]
pub enum PgJsonlError {
    // === JSONL Errors ===
    /// A line in a JSONL file is malformed or is not a JSON object.
    #[error("JSONL parse error at line {line}: {reason}")]
    Decode { line: usize, reason: String },

    // === Engine Errors ===
    /// Table existence check, creation, or clearing failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Foreign-key suspension or restoration failed.
    #[error("Constraint error: {0}")]
    Constraint(String),

    /// A batch insert failed.
    #[error("Load error: {0}")]
    Load(String),

    /// The session rejected a statement outside of a table load.
    #[error("Session error: {0}")]
    Session(String),

    // === Configuration Errors ===
    /// Invalid option value or option string.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input path does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PgJsonlError {
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Short machine-readable name of the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Schema(_) => "schema",
            Self::Constraint(_) => "constraint",
            Self::Load(_) => "load",
            Self::Session(_) => "session",
            Self::Config(_) => "config",
            Self::FileNotFound(_) => "file_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Result type using `PgJsonlError`.
pub type Result<T> = std::result::Result<T, PgJsonlError>;
