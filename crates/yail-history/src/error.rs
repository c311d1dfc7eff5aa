//! Error types for history and saving

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Failed to save {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Saving has failed too many times in a row for a retry to help.
    #[error("Saving has failed {failures} times in a row; last error: {message}")]
    SaveEscalation { failures: u32, message: String },
}

impl HistoryError {
    pub fn save_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        HistoryError::SaveFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HistoryError::SaveEscalation { .. })
    }
}
