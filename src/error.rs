//! Error handling module for ktrun
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every failure that can abort a run is a variant here; all of them are fatal
//! and none are retried.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ktrun
#[derive(Error, Debug)]
pub enum KtrunError {
    /// IO errors (file operations, directory reads, process spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the ledger backing store
    #[error("Ledger error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting absent from both the command line and the config file
    #[error("No {0} provided (set it on the command line or in the configuration file)")]
    ConfigurationMissing(&'static str),

    /// The transformation source directory does not exist
    #[error("Transformation directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// The transformation source directory holds no candidate files
    #[error("Directory contains no transformation (.ktr) files: {0}")]
    EmptyDirectory(PathBuf),

    /// The ledger database could not be opened or created
    #[error("Unable to open ledger database {path}: {source}")]
    Connection {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Another process holds the ledger's exclusive lock
    #[error("Ledger is locked; another run appears to be in progress")]
    LedgerBusy,

    /// Two source files map to the same transformation identifier
    #[error("Duplicate transformation identifier {0} in source directory")]
    DuplicateIdentifier(u64),

    /// The ledger already holds a record for this identifier
    #[error("Transformation {0} is already recorded in the ledger")]
    DuplicateKey(u64),

    /// The external executor reported failure; exit code -1 means it was
    /// terminated by a signal
    #[error("Transformation {identifier} failed (exit code {code})")]
    ExecutionFailed { identifier: u64, code: i32 },
}

/// Result type alias for ktrun operations
pub type Result<T> = std::result::Result<T, KtrunError>;

impl KtrunError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KtrunError::ConfigurationMissing("database");
        assert_eq!(
            err.to_string(),
            "No database provided (set it on the command line or in the configuration file)"
        );

        let err = KtrunError::ExecutionFailed {
            identifier: 5,
            code: 1,
        };
        assert_eq!(err.to_string(), "Transformation 5 failed (exit code 1)");

        let err = KtrunError::DuplicateIdentifier(7);
        assert_eq!(
            err.to_string(),
            "Duplicate transformation identifier 7 in source directory"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KtrunError = io_err.into();
        assert!(matches!(err, KtrunError::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        let err = KtrunError::config("bad template");
        assert!(matches!(err, KtrunError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad template");
    }
}
