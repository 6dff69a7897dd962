use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnrichError>;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Extractor error: {0}")]
    ExtractorError(#[from] entity_extractor::ExtractorError),

    #[error("Indexer error: {0}")]
    IndexerError(#[from] entity_indexer::IndexerError),

    #[error("Graph error: {0}")]
    GraphError(#[from] entity_graph::GraphError),

    #[error("Workspace error: {0}")]
    WorkspaceError(#[from] entity_workspace::WorkspaceError),

    /// The external labeler failed or returned something unusable
    #[error("Labeler error: {0}")]
    LabelerError(String),

    #[error("Labeler timed out after {0} ms")]
    Timeout(u64),

    /// Writing a snapshot failed
    #[error("Cannot persist {path}: {message}")]
    PersistError { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No valid entities in {0}")]
    NoEntities(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl EnrichError {
    pub fn labeler(msg: impl Into<String>) -> Self {
        Self::LabelerError(msg.into())
    }

    pub fn persist(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::PersistError {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
