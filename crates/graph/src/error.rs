use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Extractor error: {0}")]
    ExtractorError(#[from] entity_extractor::ExtractorError),

    #[error("Cannot read {path}: {message}")]
    UnreadableSource { path: PathBuf, message: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl GraphError {
    pub fn unreadable(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::UnreadableSource {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
