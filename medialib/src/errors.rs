use std::io;
use std::result;

use thiserror::Error;

/// Rejected before a job is ever created; surfaced to the caller as a
/// client error and never reaches a worker.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no file was uploaded")]
    MissingUpload,
    #[error("invalid {field}: path-escaping characters are not allowed")]
    UnsafePathComponent { field: &'static str },
    #[error("unknown job kind '{0}'")]
    UnknownKind(String),
}

/// A named stage's failure. Captured inside the worker and recorded as
/// the job's terminal `Failed` detail; never crosses the process
/// boundary as anything but ledger state.
#[derive(Debug, Error)]
#[error("{stage}: {cause}")]
pub struct StageError {
    pub stage: &'static str,
    pub cause: String,
}

impl StageError {
    pub fn new(stage: &'static str, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no such job exists")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("status record is corrupt: {0}")]
    CorruptRecord(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = result::Result<T, JobError>;
