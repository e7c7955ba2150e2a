//! Error taxonomy for pipeline stages
//!
//! File-level errors abort the stage that raised them. Row-level problems are
//! never errors: they are recorded as [`RowRejection`]s and the batch goes on.

use serde::Serialize;
use std::path::PathBuf;

/// Fatal, file-level error for a single pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input file not found: {0}")]
    MissingSource(PathBuf),
    #[error("input file has a header but no data rows: {0}")]
    EmptySource(PathBuf),
    #[error("required column '{column}' missing from {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid repository name '{0}' (expected owner/name)")]
    InvalidRepoName(String),
    #[error("failed to decode {path}: {message}")]
    Encoding { path: PathBuf, message: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A row that a stage could not score, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RowRejection {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub id: String,
    pub reason: String,
}

impl RowRejection {
    pub fn new(row: usize, id: impl Into<String>, reason: impl Into<String>) -> Self {
        RowRejection {
            row,
            id: id.into(),
            reason: reason.into(),
        }
    }
}
