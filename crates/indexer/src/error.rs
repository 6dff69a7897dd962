use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Extractor error: {0}")]
    ExtractorError(#[from] entity_extractor::ExtractorError),

    #[error("Workspace error: {0}")]
    WorkspaceError(#[from] entity_workspace::WorkspaceError),

    #[error("Invalid snapshot {path}: {source}")]
    InvalidSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn snapshot(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::InvalidSnapshot {
            path: path.into(),
            source,
        }
    }
}
