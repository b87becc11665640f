use crate::model::NodeKey;

/// Failure reported by an image upload collaborator.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// A mutation would break the block/inline nesting rules. Commands never
    /// produce this unless they are themselves wrong.
    #[error("structural violation: {child} cannot be placed under {parent}")]
    StructuralViolation {
        parent: &'static str,
        child: &'static str,
    },
    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),
    #[error("selection does not point into the document")]
    InvalidSelection,
    #[error("image upload failed: {0}")]
    UploadFailure(#[from] UploadError),
    #[error("editor is read-only")]
    ReadOnly,
    #[error("editor has not been mounted")]
    NotMounted,
    #[error("invalid shortcut pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("portable document is malformed: {0}")]
    Portable(#[from] serde_json::Error),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
