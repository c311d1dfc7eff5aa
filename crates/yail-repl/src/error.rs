//! Error types for live sync

use thiserror::Error;
use yail_blocks::ModelError;
use yail_compiler::CompileError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Every reconnect attempt failed; the message tells the user what to check.
    #[error("{message}")]
    Unreachable { message: String },

    #[error("The task queue was cancelled")]
    QueueCancelled,

    /// Two live components would share a name. The session cannot recover
    /// without a full reload.
    #[error("Duplicate live component name: {0}")]
    DuplicateComponent(String),

    #[error("Malformed response frame: {0}")]
    Protocol(String),

    #[error("No device selected")]
    NoDevice,

    #[error("Invalid sync configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Block model error: {0}")]
    Model(#[from] ModelError),
}

impl SyncError {
    pub fn transport(message: impl Into<String>) -> Self {
        SyncError::Transport(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol(message.into())
    }

    /// Errors that retrying cannot fix.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, SyncError::DuplicateComponent(_))
    }
}
