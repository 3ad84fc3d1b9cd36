//! Error types for taskdir
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, missing store)
//! - 3: Rejected (record invariant or status transition refused)
//! - 4: Operation failed (I/O, unparseable task file)

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::task::parse::Diagnostic;
use crate::task::transition::TransitionError;
use crate::task::validate::ValidationError;
use crate::task_id::InvalidTaskId;

/// Exit codes for the taskdir CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskdir operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task store not found: {0}")]
    StoreNotFound(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    InvalidTaskId(#[from] InvalidTaskId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Rejections (exit code 3)
    #[error("Invalid task record: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transition refused: {0}")]
    Transition(#[from] TransitionError),

    #[error("{count} task file(s) failed validation")]
    CheckFailed {
        count: usize,
        problems: serde_json::Value,
    },

    // Operation failures (exit code 4)
    #[error("Task already exists: {0}")]
    TaskExists(String),

    #[error("Failed to parse {}: {diagnostic}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        diagnostic: Diagnostic,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, diagnostic: Diagnostic) -> Self {
        Error::Parse {
            path: path.as_ref().to_path_buf(),
            diagnostic,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::StoreNotFound(_)
            | Error::TaskNotFound(_)
            | Error::InvalidTaskId(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            // Rejections
            Error::Validation(_) | Error::Transition(_) | Error::CheckFailed { .. } => {
                exit_codes::REJECTED
            }

            // Operation failures
            Error::TaskExists(_)
            | Error::Parse { .. }
            | Error::Io { .. }
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable kind, shared by the JSON and RPC surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::StoreNotFound(_) => "store_not_found",
            Error::TaskNotFound(_) => "task_not_found",
            Error::InvalidTaskId(_) => "invalid_task_id",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Validation(_) => "validation_error",
            Error::Transition(_) => "transition_error",
            Error::CheckFailed { .. } => "check_failed",
            Error::TaskExists(_) => "task_exists",
            Error::Parse { .. } => "parse_error",
            Error::Io { .. } => "io_error",
            Error::Json(_) => "json_error",
            Error::TomlParse(_) | Error::TomlSerialize(_) => "config_error",
        }
    }

    /// Structured detail for JSON consumers, when the variant has any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Parse { path, diagnostic } => Some(serde_json::json!({
                "path": path.display().to_string(),
                "diagnostic": diagnostic.kind.as_str(),
                "line": diagnostic.line,
                "column_start": diagnostic.column_start,
                "column_end": diagnostic.column_end,
                "message": diagnostic.message,
            })),
            Error::Validation(err) => Some(serde_json::json!({
                "violation": err.code(),
                "correctable": err.is_correctable(),
            })),
            Error::Transition(err) => Some(serde_json::json!({ "reason": err.code() })),
            Error::CheckFailed { problems, .. } => Some(serde_json::json!({ "problems": problems })),
            Error::Io { path, .. } => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskdir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: &'static str,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
