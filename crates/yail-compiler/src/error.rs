//! Error types for the YAIL compiler

use std::path::PathBuf;
use thiserror::Error;
use yail_blocks::ModelError;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON in {file}: {message}")]
    Json { file: PathBuf, message: String },

    #[error("Block model error: {0}")]
    Model(#[from] ModelError),

    #[error("Malformed link rule '{key}' on genus '{genus}': {message}")]
    RuleTable {
        genus: String,
        key: String,
        message: String,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Project has no root form")]
    NoRootForm,
}

impl CompileError {
    pub fn json(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CompileError::Json {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn rule_table(genus: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::RuleTable {
            genus: genus.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}
