use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace resolution
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Errors raised while reading workspace manifests
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("{0}")]
    Other(String),
}

impl WorkspaceError {
    pub fn manifest(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Manifest {
            path: path.into(),
            source,
        }
    }

    pub fn pattern(msg: impl Into<String>) -> Self {
        Self::Pattern(msg.into())
    }
}
