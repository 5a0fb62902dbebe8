use thiserror::Error;

use gallan_shared::ParseStatusError;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A referenced chat, message or user does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed input, such as a message with neither text nor media.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A uniqueness constraint would be violated.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A status column held an unknown value.
    #[error("Corrupt status value: {0}")]
    Status(#[from] ParseStatusError),
}

impl StoreError {
    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        StoreError::NotFound(what.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
