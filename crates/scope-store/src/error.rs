use scope_types::Subpath;

/// Errors from code-tree store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No tree has been remembered for this subpath, or it was forgotten.
    #[error("code tree not found: {0}")]
    CodeTreeNotFound(Subpath),

    /// A stored artifact exists but cannot be trusted.
    #[error("corrupt code tree {subpath}: {reason}")]
    CorruptTree { subpath: Subpath, reason: String },

    /// Serialization failure while writing an artifact.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` when the caller should parse the source again rather
    /// than give up.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CodeTreeNotFound(_) | Self::CorruptTree { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
