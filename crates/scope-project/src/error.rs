//! Error types for project operations.

use scope_store::StoreError;
use scope_types::{Subpath, TypeError};
use thiserror::Error;

/// Errors that can occur while maintaining a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No module is registered for the given path or locator.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A module is already registered under this subpath.
    #[error("module already registered: {0}")]
    ModuleAlreadyExists(Subpath),

    /// No point of entry with this name.
    #[error("point of entry not found: {0}")]
    PointOfEntryNotFound(String),

    /// A point of entry with this name already exists.
    #[error("point of entry already exists: {0}")]
    PointOfEntryAlreadyExists(String),

    /// A point-of-entry name that cannot be used as a file name.
    #[error("invalid point of entry name: {0:?}")]
    InvalidName(String),

    /// The parser rejected a module's source.
    #[error("failed to parse {subpath}: {reason}")]
    Parse { subpath: Subpath, reason: String },

    /// A point of entry could not be run at all.
    #[error("failed to run point of entry {name}: {reason}")]
    Run { name: String, reason: String },

    /// The configuration file is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The saved project could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A path could not be turned into a module subpath.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),

    /// Code-tree store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error while reading sources or project state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for project results.
pub type ProjectResult<T> = Result<T, ProjectError>;
