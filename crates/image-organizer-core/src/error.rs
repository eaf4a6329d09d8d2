use std::path::PathBuf;
use thiserror::Error;

use crate::staging::OperationStatus;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the image-organizer library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Descriptor, config or input file could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Operation id unknown to the staging ledger
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    /// Confirm or undo requested on an operation that is no longer staged
    #[error("Operation {operation_id} is {status}, expected staged")]
    InvalidTransition {
        operation_id: String,
        status: OperationStatus,
    },

    /// Staging root could not be created or used
    #[error("Staging root unusable at {path}: {source}")]
    StagingRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Recoverable trash rejected a file
    #[error("Trash error: {0}")]
    Trash(String),
}
