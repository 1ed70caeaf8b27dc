//! Error types for Manifold.
//!
//! This module defines a unified error enum covering every error category in
//! the system: compile-time validation, runtime lookup and input contract
//! violations, configuration, I/O, and serialization.

use thiserror::Error;

/// Unified error type for Manifold.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
///
/// Compile-time failures abort the whole compile run and carry the offending
/// document path in their message. Render-time failures abort only the
/// single render call; the registry stays usable.
#[derive(Error, Debug)]
pub enum AppError {
    /// Compile-time structural or validation failures: malformed header or
    /// body, invalid/overlapping/missing declarations, path-identity
    /// mismatch, duplicate id+version, broken include references.
    #[error("Compile error: {0}")]
    Compile(String),

    /// Prompt id or id+version absent from a loaded registry
    #[error("Prompt not found: {0}")]
    NotFound(String),

    /// Runtime input contract violations: missing/extra variables, extra
    /// blocks, missing required block, enricher overreach.
    #[error("Input error: {0}")]
    Input(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
