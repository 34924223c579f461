use std::fmt::Display;
use thiserror::Error;

#[macro_export]
macro_rules! logerr {
    () => {
        |e| {
            tracing::error!("Error: {:?}", e);
        }
    };
}

/// Remote operation that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BeginUpload,
    UploadPart(i32),
    CompleteUpload,
    GetObject,
    DeleteObject,
    ListObjects,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::BeginUpload => write!(f, "begin multipart upload"),
            Operation::UploadPart(part_number) => write!(f, "upload part {}", part_number),
            Operation::CompleteUpload => write!(f, "complete multipart upload"),
            Operation::GetObject => write!(f, "get object"),
            Operation::DeleteObject => write!(f, "delete object"),
            Operation::ListObjects => write!(f, "list objects"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Backend unavailable during {operation}: {message}")]
    BackendUnavailable { operation: Operation, message: String },
    #[error("Transfer of part {part_number} failed: {message}")]
    TransferFailed { part_number: i32, message: String },
    #[error("Finalize rejected: {message}")]
    FinalizeRejected { message: String },
    #[error("Incomplete upload: expected {expected} parts, {completed} completed")]
    IncompleteUpload { expected: usize, completed: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True for literal I/O failures, as opposed to an incomplete part set
    /// or a caller/config mistake
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            StorageError::BackendUnavailable { .. }
                | StorageError::TransferFailed { .. }
                | StorageError::FinalizeRejected { .. }
                | StorageError::Io(_)
        )
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            StorageError::BackendUnavailable { operation, .. } => Some(*operation),
            StorageError::TransferFailed { part_number, .. } => {
                Some(Operation::UploadPart(*part_number))
            }
            StorageError::FinalizeRejected { .. } => Some(Operation::CompleteUpload),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
