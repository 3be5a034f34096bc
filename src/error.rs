use std::path::PathBuf;
use thiserror::Error;

/// Main error type for jobmatch
#[derive(Error, Debug)]
pub enum JobMatchError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Input record could not be parsed
    #[error("Parse error in {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Corpus index could not be built or opened
    #[error("Index error: {0}")]
    Index(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Result store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Result store unavailable (pool exhausted, poisoned lock)
    #[error("Store error: {0}")]
    Store(String),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for jobmatch operations
pub type Result<T> = std::result::Result<T, JobMatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_binary_context_keeps_library_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let failed: Result<()> = Err(JobMatchError::Io {
            source: io,
            context: "Failed to open results.db".to_string(),
        });

        let err = failed.context("Failed to write retrieval output out.json").unwrap_err();
        let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();

        assert_eq!(chain[0], "Failed to write retrieval output out.json");
        assert!(chain[1].contains("Failed to open results.db"));
        assert!(chain.iter().any(|e| e.contains("denied")));
        assert!(err.downcast_ref::<JobMatchError>().is_some());
    }
}
