use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("subpath must not be empty")]
    EmptySubpath,

    #[error("subpath must be relative to the project root: {0}")]
    AbsoluteSubpath(String),

    #[error("subpath escapes the project root: {0}")]
    EscapesRoot(String),

    #[error("path {path} is outside of project root {root}")]
    OutsideProject { path: String, root: String },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
