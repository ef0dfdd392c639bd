//! Error types for pricelist-sync
//!
//! This module provides the error taxonomy of the sync pipeline:
//! - Domain-specific error types (Auth, Transfer, Validation, Database)
//! - Configuration errors raised before any stage runs
//! - Machine-readable error codes used as structured log fields

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pricelist-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pricelist-sync
///
/// Every stage of the pipeline reports failures through this type. Each
/// variant carries enough context to identify the failing step in the log.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "DB_NAME")
        key: Option<String>,
    },

    /// Remote credential or token failure
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Listing or download failure against the artifact store
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Artifact or export failed structural checks
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Restore or export query failure
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required file or directory was not found
    #[error("not found: {0}")]
    NotFound(String),
}

/// Token refresh failures
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint rejected the stored refresh credential
    #[error("token endpoint rejected refresh credential ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body, useful for diagnosing revoked tokens
        body: String,
    },

    /// The token request did not complete in time
    #[error("token request timed out")]
    Timeout,

    /// The token request failed before a response was received
    #[error("token request failed: {0}")]
    Request(String),

    /// The token endpoint answered without a usable access token
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// Listing and download failures
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote folder has no backup artifacts to download
    #[error("no backup files found in {folder}")]
    NoBackups {
        /// The remote folder that was listed
        folder: String,
    },

    /// The store answered with a non-success HTTP status
    #[error("{operation} returned status {status}: {body}")]
    Status {
        /// The API operation (e.g., "list_folder")
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Transport failure (connect, timeout, reset)
    #[error("{operation} failed: {reason}")]
    Request {
        /// The API operation (e.g., "download")
        operation: &'static str,
        /// The underlying transport error
        reason: String,
    },

    /// The store answered with a body we could not interpret
    #[error("{operation} returned an invalid response: {reason}")]
    InvalidResponse {
        /// The API operation (e.g., "get_temporary_link")
        operation: &'static str,
        /// What was wrong with the response
        reason: String,
    },

    /// Writing the downloaded bytes to local storage failed
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// Destination path
        path: PathBuf,
        /// The underlying I/O error
        reason: String,
    },
}

/// Integrity validation failures
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Backup artifact does not exist on local storage
    #[error("backup file not found: {0}")]
    ArtifactMissing(PathBuf),

    /// Backup artifact exists but has no content
    #[error("backup file is empty: {0}")]
    ArtifactEmpty(PathBuf),

    /// Export file did not pass structural checks
    #[error("export {path} rejected: {reason}")]
    ExportRejected {
        /// The rejected export file
        path: PathBuf,
        /// The reason reported by the validator
        reason: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database server did not answer the readiness probe
    #[error("database server {host}:{port} is not reachable")]
    Unreachable {
        /// Configured host
        host: String,
        /// Configured port
        port: u16,
    },

    /// A restore phase exited non-zero with a non-benign diagnostic
    #[error("{phase} failed with status {status}: {stderr}")]
    RestoreFailed {
        /// The restore phase that failed (drop, create, restore)
        phase: String,
        /// Process exit code (-1 when terminated by a signal)
        status: i32,
        /// Diagnostic output of the tool
        stderr: String,
    },

    /// A required PostgreSQL client tool could not be located
    #[error("required tool `{0}` not found (configure its path or add it to PATH)")]
    ToolNotFound(String),

    /// A PostgreSQL client tool exists but could not be started
    #[error("failed to execute {tool}: {reason}")]
    ToolLaunchFailed {
        /// Tool name (dropdb, createdb, pg_restore)
        tool: String,
        /// The underlying spawn error
        reason: String,
    },

    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Writing the query result to disk failed
    #[error("export write failed for {path}: {reason}")]
    ExportWriteFailed {
        /// Output path of the export
        path: PathBuf,
        /// The underlying error
        reason: String,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Stable machine-readable code for this error, logged as `error_code`
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Auth(e) => match e {
                AuthError::Rejected { .. } => "auth_rejected",
                AuthError::Timeout => "auth_timeout",
                AuthError::Request(_) => "auth_request_failed",
                AuthError::MalformedResponse(_) => "auth_malformed_response",
            },
            Error::Transfer(e) => match e {
                TransferError::NoBackups { .. } => "no_backups",
                TransferError::Status { .. } => "transfer_status",
                TransferError::Request { .. } => "transfer_request_failed",
                TransferError::InvalidResponse { .. } => "transfer_invalid_response",
                TransferError::WriteFailed { .. } => "transfer_write_failed",
            },
            Error::Validation(e) => match e {
                ValidationError::ArtifactMissing(_) => "artifact_missing",
                ValidationError::ArtifactEmpty(_) => "artifact_empty",
                ValidationError::ExportRejected { .. } => "export_rejected",
            },
            Error::Database(e) => match e {
                DatabaseError::Unreachable { .. } => "database_unreachable",
                DatabaseError::RestoreFailed { .. } => "restore_failed",
                DatabaseError::ToolNotFound(_) => "tool_not_found",
                DatabaseError::ToolLaunchFailed { .. } => "tool_launch_failed",
                DatabaseError::ConnectionFailed(_) => "database_connection_failed",
                DatabaseError::QueryFailed(_) => "query_failed",
                DatabaseError::ExportWriteFailed { .. } => "export_write_failed",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
        }
    }
}
