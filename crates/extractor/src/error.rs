use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Errors that can occur while parsing and extracting entities
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Failed to parse the source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// File kind the extractors do not handle
    #[error("Unsupported file kind: {0}")]
    UnsupportedKind(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ExtractorError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported kind error
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind(kind.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
